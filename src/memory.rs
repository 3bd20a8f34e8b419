// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory broker
//!
//! A partitioned, append-only log kept in process memory. It implements the
//! same connector traits as the Kafka backend so the producer and the consumer
//! can run unchanged in tests and local development.
//!
//! - Messages are assigned to partitions by hashing the key, so equal keys
//!   always share a partition and keep their relative order.
//! - Consumer groups resume from their committed offsets; groups without a
//!   committed offset start at the beginning of each partition.
//! - [`InMemoryBroker::close`] ends every consumer stream once it is drained.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::debug;

use crate::broker::{
    decode_message_value, BrokerRecord, ConsumerClient, ConsumerConnector, DeliveryReport,
    ProducerClient, ProducerConnector,
};
use crate::errors::{EventBusError, EventBusResult};

const DEFAULT_PARTITIONS: i32 = 3;

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Option<Vec<u8>>,
    value: Vec<u8>,
}

type CommitKey = (String, String, i32);

#[derive(Debug, Default)]
struct BrokerState {
    logs: Mutex<HashMap<String, Vec<Vec<StoredMessage>>>>,
    committed: Mutex<HashMap<CommitKey, i64>>,
    failing_topics: Mutex<Vec<String>>,
    receive_failure: Mutex<Option<String>>,
    sends: AtomicUsize,
    connects: AtomicUsize,
    consumer_stops: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to an in-memory broker
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
    partitions: i32,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

impl InMemoryBroker {
    /// Broker whose topics all have `partitions` partitions (at least one)
    pub fn new(partitions: i32) -> Self {
        Self {
            state: Arc::new(BrokerState::default()),
            partitions: partitions.max(1),
        }
    }

    /// Partition a key is routed to
    pub fn partition_for(&self, key: Option<&[u8]>) -> i32 {
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % self.partitions as u64) as i32
            }
            None => 0,
        }
    }

    /// Append a message directly, bypassing any producer
    pub fn append(&self, topic: &str, key: Option<&[u8]>, value: Vec<u8>) -> DeliveryReport {
        let partition = self.partition_for(key);
        let offset = {
            let mut logs = lock(&self.state.logs);
            let log = logs
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
            let partition_log = &mut log[partition as usize];
            partition_log.push(StoredMessage {
                key: key.map(<[u8]>::to_vec),
                value,
            });
            (partition_log.len() - 1) as i64
        };
        self.state.notify.notify_waiters();
        DeliveryReport { partition, offset }
    }

    /// All records of a topic, partition by partition in offset order
    pub fn records(&self, topic: &str) -> Vec<BrokerRecord> {
        let logs = lock(&self.state.logs);
        let Some(log) = logs.get(topic) else {
            return Vec::new();
        };

        log.iter()
            .enumerate()
            .flat_map(|(partition, messages)| {
                messages.iter().enumerate().map(move |(offset, message)| BrokerRecord {
                    topic: topic.to_string(),
                    partition: partition as i32,
                    offset: offset as i64,
                    key: message.key.clone(),
                    value: decode_message_value(Some(&message.value)),
                })
            })
            .collect()
    }

    /// Topics that hold at least one partition log
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = lock(&self.state.logs).keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Messages accepted from producers
    pub fn send_count(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    /// Producer connections opened
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Consumer connections stopped
    pub fn consumer_stop_count(&self) -> usize {
        self.state.consumer_stops.load(Ordering::SeqCst)
    }

    /// Next offset to read for a consumer group, if it committed one
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        lock(&self.state.committed)
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Make every producer send to `topic` fail with a broker error
    pub fn fail_sends_to(&self, topic: &str) {
        lock(&self.state.failing_topics).push(topic.to_string());
    }

    /// Make the next consumer receive return a broker error
    pub fn fail_next_receive(&self, message: impl Into<String>) {
        *lock(&self.state.receive_failure) = Some(message.into());
        self.state.notify.notify_waiters();
    }

    /// End all consumer streams once they have nothing left to read
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Consumer connector for a group
    pub fn consumer(&self, group: impl Into<String>, auto_commit: bool) -> InMemoryConsumerConnector {
        InMemoryConsumerConnector {
            broker: self.clone(),
            group: group.into(),
            auto_commit,
        }
    }

    fn commit(&self, group: &str, topic: &str, partition: i32, next_offset: i64) {
        lock(&self.state.committed).insert(
            (group.to_string(), topic.to_string(), partition),
            next_offset,
        );
    }
}

#[async_trait]
impl ProducerConnector for InMemoryBroker {
    async fn connect(&self) -> EventBusResult<Arc<dyn ProducerClient>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemoryProducer {
            broker: self.clone(),
        }))
    }
}

/// Producer connection to an [`InMemoryBroker`]
#[derive(Debug)]
pub struct InMemoryProducer {
    broker: InMemoryBroker,
}

#[async_trait]
impl ProducerClient for InMemoryProducer {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: Vec<u8>,
    ) -> EventBusResult<DeliveryReport> {
        if lock(&self.broker.state.failing_topics).iter().any(|t| t == topic) {
            return Err(EventBusError::Broker(format!(
                "topic {} is not accepting messages",
                topic
            )));
        }

        // Yield so concurrent sends interleave like network calls do
        tokio::task::yield_now().await;

        let report = self.broker.append(topic, key, payload);
        self.broker.state.sends.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }

    async fn flush(&self, _timeout: Duration) -> EventBusResult<()> {
        Ok(())
    }

    fn pending(&self) -> usize {
        0
    }
}

/// Opens consumer connections for one group
#[derive(Debug, Clone)]
pub struct InMemoryConsumerConnector {
    broker: InMemoryBroker,
    group: String,
    auto_commit: bool,
}

#[async_trait]
impl ConsumerConnector for InMemoryConsumerConnector {
    async fn connect(&self, topics: &[String]) -> EventBusResult<Arc<dyn ConsumerClient>> {
        let mut positions = HashMap::new();
        for topic in topics {
            for partition in 0..self.broker.partitions {
                let start = self
                    .broker
                    .committed_offset(&self.group, topic, partition)
                    .unwrap_or(0);
                positions.insert((topic.clone(), partition), start);
            }
        }

        debug!(group = %self.group, topics = ?topics, "In-memory consumer connected");

        let (stop_tx, _) = watch::channel(false);
        Ok(Arc::new(InMemoryConsumer {
            broker: self.broker.clone(),
            group: self.group.clone(),
            auto_commit: self.auto_commit,
            topics: topics.to_vec(),
            positions: Mutex::new(positions),
            stop_tx,
        }))
    }
}

/// Consumer connection to an [`InMemoryBroker`]
#[derive(Debug)]
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group: String,
    auto_commit: bool,
    topics: Vec<String>,
    positions: Mutex<HashMap<(String, i32), i64>>,
    stop_tx: watch::Sender<bool>,
}

impl InMemoryConsumer {
    fn try_next(&self) -> Option<BrokerRecord> {
        let logs = lock(&self.broker.state.logs);
        let mut positions = lock(&self.positions);

        for topic in &self.topics {
            let Some(log) = logs.get(topic) else {
                continue;
            };
            for (partition, messages) in log.iter().enumerate() {
                let partition = partition as i32;
                let position = positions.entry((topic.clone(), partition)).or_insert(0);
                let Some(message) = messages.get(*position as usize) else {
                    continue;
                };

                let record = BrokerRecord {
                    topic: topic.clone(),
                    partition,
                    offset: *position,
                    key: message.key.clone(),
                    value: decode_message_value(Some(&message.value)),
                };
                *position += 1;
                if self.auto_commit {
                    self.broker.commit(&self.group, topic, partition, *position);
                }
                return Some(record);
            }
        }
        None
    }
}

#[async_trait]
impl ConsumerClient for InMemoryConsumer {
    async fn recv(&self) -> Option<EventBusResult<BrokerRecord>> {
        let mut stopped = self.stop_tx.subscribe();
        loop {
            let notified = self.broker.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *stopped.borrow() {
                return None;
            }
            if let Some(message) = lock(&self.broker.state.receive_failure).take() {
                return Some(Err(EventBusError::Broker(message)));
            }
            if let Some(record) = self.try_next() {
                return Some(Ok(record));
            }
            if self.broker.state.closed.load(Ordering::SeqCst) {
                return None;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = async { let _ = stopped.wait_for(|s| *s).await; } => return None,
            }
        }
    }

    async fn commit(&self, record: &BrokerRecord) -> EventBusResult<()> {
        self.broker
            .commit(&self.group, &record.topic, record.partition, record.offset + 1);
        Ok(())
    }

    fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            self.broker.state.consumer_stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_keys_share_a_partition() {
        let broker = InMemoryBroker::new(8);
        let first = broker.append("t", Some(b"member-1"), b"{}".to_vec());
        let second = broker.append("t", Some(b"member-1"), b"{}".to_vec());

        assert_eq!(first.partition, second.partition);
        assert_eq!(second.offset, first.offset + 1);
    }

    #[tokio::test]
    async fn test_consumer_resumes_from_committed_offset() {
        let broker = InMemoryBroker::new(1);
        broker.append("t", Some(b"k"), br#"{"n":1}"#.to_vec());
        broker.append("t", Some(b"k"), br#"{"n":2}"#.to_vec());

        let topics = vec!["t".to_string()];
        let first = broker.consumer("g", true).connect(&topics).await.unwrap();
        let record = first.recv().await.unwrap().unwrap();
        assert_eq!(record.value, json!({"n": 1}));
        first.stop();
        assert!(first.recv().await.is_none());

        let second = broker.consumer("g", true).connect(&topics).await.unwrap();
        let record = second.recv().await.unwrap().unwrap();
        assert_eq!(record.value, json!({"n": 2}));
        assert_eq!(broker.committed_offset("g", "t", 0), Some(2));
    }

    #[tokio::test]
    async fn test_manual_commit_group_does_not_advance_on_read() {
        let broker = InMemoryBroker::new(1);
        broker.append("t", None, b"{}".to_vec());

        let consumer = broker.consumer("g", false).connect(&["t".to_string()]).await.unwrap();
        let record = consumer.recv().await.unwrap().unwrap();
        assert_eq!(broker.committed_offset("g", "t", 0), None);

        consumer.commit(&record).await.unwrap();
        assert_eq!(broker.committed_offset("g", "t", 0), Some(1));
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_append_and_ends_on_close() {
        let broker = InMemoryBroker::new(2);
        let consumer = broker.consumer("g", true).connect(&["t".to_string()]).await.unwrap();

        let reader = tokio::spawn({
            let consumer = consumer.clone();
            async move {
                let mut seen = 0;
                while let Some(record) = consumer.recv().await {
                    record.unwrap();
                    seen += 1;
                }
                seen
            }
        });

        tokio::task::yield_now().await;
        broker.append("t", Some(b"a"), b"{}".to_vec());
        broker.append("t", Some(b"b"), b"{}".to_vec());
        broker.close();

        assert_eq!(reader.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_injected_receive_failure_is_returned_once() {
        let broker = InMemoryBroker::new(1);
        broker.append("t", None, b"{}".to_vec());
        let consumer = broker.consumer("g", true).connect(&["t".to_string()]).await.unwrap();

        broker.fail_next_receive("leader not available");

        let err = consumer.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, EventBusError::Broker(ref m) if m == "leader not available"));
        assert!(consumer.recv().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_repeated_stop_counts_once() {
        let broker = InMemoryBroker::new(1);
        let consumer = broker.consumer("g", true).connect(&["t".to_string()]).await.unwrap();

        consumer.stop();
        consumer.stop();

        assert_eq!(broker.consumer_stop_count(), 1);
    }
}
