use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use crate::bus::{BusConsumer, BusMessage, PollEvent};
use crate::error::BusError;

/// Connection settings for the Kafka-backed consumer.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// A random suffix is appended so the consumer never joins a production group.
    pub group_id_prefix: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".into(),
            group_id_prefix: "seldon-cli".into(),
        }
    }
}

/// Observer-only Kafka consumer: direct partition assignment, no commits.
///
/// Dropping it closes the underlying client, which can block for a long
/// time. Short-lived processes may prefer to leak it on exit; do not do that
/// in a long-running service.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    group_id: String,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, BusError> {
        let group_id = format!("{}-{}", config.group_id_prefix, rand::random::<u64>());
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", "largest")
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| BusError::Client(e.to_string()))?;
        info!(brokers = %config.brokers, group_id = %group_id, "kafka consumer created");
        Ok(Self { consumer, group_id })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

#[async_trait]
impl BusConsumer for KafkaConsumer {
    async fn partitions(&mut self, topic: &str, timeout: Duration) -> Result<Vec<i32>, BusError> {
        let metadata = self
            .consumer
            .fetch_metadata(Some(topic), timeout)
            .map_err(|e| BusError::Metadata {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        let topic_meta = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))?;
        if let Some(err) = topic_meta.error() {
            return Err(BusError::Metadata {
                topic: topic.to_string(),
                reason: format!("{err:?}"),
            });
        }
        let partitions: Vec<i32> = topic_meta.partitions().iter().map(|p| p.id()).collect();
        if partitions.is_empty() {
            return Err(BusError::UnknownTopic(topic.to_string()));
        }
        debug!(topic, partitions = partitions.len(), "fetched topic metadata");
        Ok(partitions)
    }

    fn assign_tail(
        &mut self,
        topic: &str,
        partitions: &[i32],
        count: u64,
    ) -> Result<(), BusError> {
        let assign_err = |e: rdkafka::error::KafkaError| BusError::Assign {
            topic: topic.to_string(),
            reason: e.to_string(),
        };
        let tail = Offset::OffsetTail(i64::try_from(count).unwrap_or(i64::MAX));
        let mut tpl = TopicPartitionList::new();
        for &partition in partitions {
            tpl.add_partition_offset(topic, partition, tail)
                .map_err(assign_err)?;
        }
        self.consumer.assign(&tpl).map_err(assign_err)
    }

    async fn poll(&mut self, wait: Duration) -> Option<PollEvent> {
        match tokio::time::timeout(wait, self.consumer.recv()).await {
            Err(_) => None,
            Ok(Ok(msg)) => Some(PollEvent::Message(BusMessage {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                payload: Bytes::copy_from_slice(msg.payload().unwrap_or_default()),
            })),
            Ok(Err(e)) => Some(PollEvent::BrokerError(e.to_string())),
        }
    }
}
