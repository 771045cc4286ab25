use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::{BusConsumer, PollEvent};
use crate::envelope::{
    Envelope, EnvelopeDecoder, InferInputTensor, InferOutputTensor, ModelInferRequest,
    ModelInferResponse, ProtobufDecoder,
};
use crate::error::{InspectError, Result};
use crate::specifier::{ResolvedTopic, ResolvedTopics};

/// Bounds applied to each topic visit.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Wall-clock budget per topic (default: 4 seconds).
    pub deadline: Duration,
    /// Longest single poll wait (default: 1 second).
    pub poll_wait: Duration,
    /// Timeout for the partition metadata lookup (default: 1 second).
    pub metadata_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(4),
            poll_wait: Duration::from_secs(1),
            metadata_timeout: Duration::from_secs(1),
        }
    }
}

/// What a sink receives: a whole envelope, or one tensor when a filter is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplayItem {
    Request(ModelInferRequest),
    Response(ModelInferResponse),
    Input(InferInputTensor),
    Output(InferOutputTensor),
}

/// Receives decoded items during a replay.
pub trait ReplaySink {
    /// Called before a topic is consumed.
    fn begin_topic(&mut self, _topic: &ResolvedTopic) -> Result<()> {
        Ok(())
    }

    fn emit(&mut self, topic: &ResolvedTopic, item: ReplayItem) -> Result<()>;
}

impl<F> ReplaySink for F
where
    F: FnMut(&ResolvedTopic, ReplayItem) -> Result<()>,
{
    fn emit(&mut self, topic: &ResolvedTopic, item: ReplayItem) -> Result<()> {
        self(topic, item)
    }
}

/// Messages seen on one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub topic: String,
    pub seen: u64,
}

/// Per-topic message counts, in visit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub topics: Vec<TopicSummary>,
}

impl ReplaySummary {
    pub fn total_seen(&self) -> u64 {
        self.topics.iter().map(|t| t.seen).sum()
    }
}

/// Replays the tail of each resolved topic, one topic at a time.
///
/// The consumer is owned for the lifetime of the replayer and reused across
/// topics; each topic visit replaces the previous partition assignment.
pub struct TailReplayer<C, D = ProtobufDecoder> {
    consumer: C,
    decoder: D,
    config: ReplayConfig,
}

impl<C: BusConsumer> TailReplayer<C, ProtobufDecoder> {
    pub fn new(consumer: C, config: ReplayConfig) -> Self {
        Self::with_decoder(consumer, ProtobufDecoder, config)
    }
}

impl<C: BusConsumer, D: EnvelopeDecoder> TailReplayer<C, D> {
    pub fn with_decoder(consumer: C, decoder: D, config: ReplayConfig) -> Self {
        Self {
            consumer,
            decoder,
            config,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Give back the consumer without closing it.
    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Replay up to `count` messages per partition of every topic, in order.
    ///
    /// With several partitions a topic may surface up to `partitions * count`
    /// messages, but its loop stops once `count` have been seen or the
    /// deadline passes. A decode failure aborts the whole replay.
    pub async fn replay<S: ReplaySink + ?Sized>(
        &mut self,
        topics: &ResolvedTopics,
        count: u64,
        sink: &mut S,
    ) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for topic in &topics.topics {
            let seen = if count == 0 {
                debug!(topic = %topic.topic, "replay count is zero, skipping");
                0
            } else {
                self.replay_topic(topic, topics.tensor.as_deref(), count, sink)
                    .await?
            };
            summary.topics.push(TopicSummary {
                topic: topic.topic.clone(),
                seen,
            });
        }
        Ok(summary)
    }

    async fn replay_topic<S: ReplaySink + ?Sized>(
        &mut self,
        topic: &ResolvedTopic,
        tensor: Option<&str>,
        count: u64,
        sink: &mut S,
    ) -> Result<u64> {
        sink.begin_topic(topic)?;

        let partitions = self
            .consumer
            .partitions(&topic.topic, self.config.metadata_timeout)
            .await?;
        self.consumer
            .assign_tail(&topic.topic, &partitions, count)?;
        info!(
            topic = %topic.topic,
            partitions = partitions.len(),
            count,
            "replaying topic tail"
        );

        let deadline = Instant::now() + self.config.deadline;
        let mut seen = 0u64;
        while seen < count {
            let now = Instant::now();
            if now >= deadline {
                debug!(topic = %topic.topic, seen, "replay deadline reached");
                break;
            }
            let wait = self.config.poll_wait.min(deadline - now);
            match self.consumer.poll(wait).await {
                None => continue,
                Some(PollEvent::Message(message)) => {
                    if message.topic != topic.topic {
                        debug!(
                            topic = %message.topic,
                            "dropping message from a previous assignment"
                        );
                        continue;
                    }
                    seen += 1;
                    let envelope = self
                        .decoder
                        .decode(&message.payload, topic.direction)
                        .map_err(|source| InspectError::Decode {
                            topic: topic.topic.clone(),
                            source,
                        })?;
                    for item in project(envelope, tensor) {
                        sink.emit(topic, item)?;
                    }
                }
                Some(PollEvent::BrokerError(reason)) => {
                    warn!(topic = %topic.topic, error = %reason, "kafka error");
                }
                Some(PollEvent::Other) => {}
            }
        }
        Ok(seen)
    }
}

/// Apply the tensor filter: whole envelope when unset, else matching tensors.
fn project(envelope: Envelope, tensor: Option<&str>) -> Vec<ReplayItem> {
    match (envelope, tensor) {
        (Envelope::Request(req), None) => vec![ReplayItem::Request(req)],
        (Envelope::Response(res), None) => vec![ReplayItem::Response(res)],
        (Envelope::Request(req), Some(name)) => req
            .inputs
            .into_iter()
            .filter(|input| input.name == name)
            .map(ReplayItem::Input)
            .collect(),
        (Envelope::Response(res), Some(name)) => res
            .outputs
            .into_iter()
            .filter(|output| output.name == name)
            .map(ReplayItem::Output)
            .collect(),
    }
}
