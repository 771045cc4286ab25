use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BusError;

/// A record read from one partition of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Bytes,
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Message(BusMessage),
    /// Broker-level error reported by the client. Not fatal.
    BrokerError(String),
    /// Anything else the client surfaces (rebalance notices, stats, ...).
    Other,
}

/// Read-only partition-level access to the message bus.
///
/// Implementations assign partitions directly, never join a consumer group
/// and never commit offsets.
#[async_trait]
pub trait BusConsumer: Send {
    /// Partition ids of `topic`, bounded by `timeout`.
    async fn partitions(&mut self, topic: &str, timeout: Duration) -> Result<Vec<i32>, BusError>;

    /// Replace the current assignment with `partitions` of `topic`, each
    /// positioned `count` messages before its end.
    fn assign_tail(&mut self, topic: &str, partitions: &[i32], count: u64)
        -> Result<(), BusError>;

    /// Wait up to `wait` for the next event. `None` if nothing arrived.
    async fn poll(&mut self, wait: Duration) -> Option<PollEvent>;
}

/// In-process bus holding partitioned topic logs.
///
/// Polling an empty assignment sleeps for the full wait, so deadlines behave
/// as they would against a quiet broker.
#[derive(Debug, Default)]
pub struct MemoryBus {
    topics: HashMap<String, Vec<Vec<Bytes>>>,
    injected: VecDeque<PollEvent>,
    /// (topic, partition, next offset)
    cursors: Vec<(String, i32, usize)>,
    next_cursor: usize,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `topic` with `partitions` empty partitions. Existing data is kept.
    pub fn create_topic(&mut self, topic: &str, partitions: usize) {
        let logs = self.topics.entry(topic.to_string()).or_default();
        if logs.len() < partitions {
            logs.resize_with(partitions, Vec::new);
        }
    }

    /// Append a record to a partition, creating the topic/partition as needed.
    pub fn produce(&mut self, topic: &str, partition: i32, payload: impl Into<Bytes>) {
        let idx = partition.max(0) as usize;
        self.create_topic(topic, idx + 1);
        if let Some(logs) = self.topics.get_mut(topic) {
            logs[idx].push(payload.into());
        }
    }

    /// Queue a non-message event to be returned by the next poll.
    pub fn inject(&mut self, event: PollEvent) {
        self.injected.push_back(event);
    }

    fn next_message(&mut self) -> Option<BusMessage> {
        let n = self.cursors.len();
        for i in 0..n {
            let idx = (self.next_cursor + i) % n;
            let (topic, partition, offset) = &mut self.cursors[idx];
            let Some(record) = self
                .topics
                .get(topic.as_str())
                .and_then(|logs| logs.get(*partition as usize))
                .and_then(|log| log.get(*offset))
            else {
                continue;
            };
            let message = BusMessage {
                topic: topic.clone(),
                partition: *partition,
                offset: *offset as i64,
                payload: record.clone(),
            };
            *offset += 1;
            self.next_cursor = (idx + 1) % n;
            return Some(message);
        }
        None
    }
}

#[async_trait]
impl BusConsumer for MemoryBus {
    async fn partitions(
        &mut self,
        topic: &str,
        _timeout: Duration,
    ) -> Result<Vec<i32>, BusError> {
        let logs = self
            .topics
            .get(topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))?;
        Ok((0..logs.len() as i32).collect())
    }

    fn assign_tail(
        &mut self,
        topic: &str,
        partitions: &[i32],
        count: u64,
    ) -> Result<(), BusError> {
        let logs = self
            .topics
            .get(topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))?;
        let mut cursors = Vec::with_capacity(partitions.len());
        for &partition in partitions {
            let log = logs
                .get(partition as usize)
                .ok_or_else(|| BusError::Assign {
                    topic: topic.to_string(),
                    reason: format!("no partition {partition}"),
                })?;
            let start = log.len().saturating_sub(count as usize);
            cursors.push((topic.to_string(), partition, start));
        }
        self.cursors = cursors;
        self.next_cursor = 0;
        Ok(())
    }

    async fn poll(&mut self, wait: Duration) -> Option<PollEvent> {
        if let Some(event) = self.injected.pop_front() {
            return Some(event);
        }
        if let Some(message) = self.next_message() {
            return Some(PollEvent::Message(message));
        }
        tokio::time::sleep(wait).await;
        None
    }
}
