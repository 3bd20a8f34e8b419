// Copyright (c) 2025 - Cowboy AI, Inc.
//! Kafka connections via rdkafka
//!
//! Producer connections wrap a [`FutureProducer`]; consumer connections wrap a
//! [`StreamConsumer`]. Both are built from the librdkafka settings rendered by
//! [`KafkaConfig`].

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Message, Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::broker::{
    decode_message_value, BrokerRecord, ConsumerClient, ConsumerConnector, DeliveryReport,
    ProducerClient, ProducerConnector,
};
use crate::config::KafkaConfig;
use crate::errors::{EventBusError, EventBusResult};

/// Opens [`KafkaProducerClient`] connections
#[derive(Debug, Clone)]
pub struct KafkaProducerConnector {
    config: KafkaConfig,
}

impl KafkaProducerConnector {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProducerConnector for KafkaProducerConnector {
    async fn connect(&self) -> EventBusResult<Arc<dyn ProducerClient>> {
        self.config.validate_producer()?;
        let producer: FutureProducer = self.config.producer_client_config().create()?;

        info!(
            brokers = %self.config.brokers_string(),
            acks = %self.config.producer.acks,
            idempotence = self.config.enable_idempotence,
            "Connected Kafka producer"
        );

        Ok(Arc::new(KafkaProducerClient {
            producer,
            send_timeout: self.config.producer.timeout(),
        }))
    }
}

/// Producer connection backed by librdkafka
pub struct KafkaProducerClient {
    producer: FutureProducer,
    send_timeout: Duration,
}

#[async_trait]
impl ProducerClient for KafkaProducerClient {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: Vec<u8>,
    ) -> EventBusResult<DeliveryReport> {
        let mut record = FutureRecord::<[u8], Vec<u8>>::to(topic).payload(&payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let delivery = self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(err, _)| EventBusError::Broker(format!("send to {} failed: {}", topic, err)))?;

        Ok(DeliveryReport {
            partition: delivery.partition,
            offset: delivery.offset,
        })
    }

    async fn flush(&self, timeout: Duration) -> EventBusResult<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| EventBusError::Broker(format!("flush task failed: {}", e)))?
            .map_err(|e| match e {
                rdkafka::error::KafkaError::Flush(code) => {
                    EventBusError::Timeout(format!("flush did not complete: {}", code))
                }
                other => other.into(),
            })
    }

    fn pending(&self) -> usize {
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }
}

/// Opens [`KafkaConsumerClient`] connections
#[derive(Debug, Clone)]
pub struct KafkaConsumerConnector {
    config: KafkaConfig,
}

impl KafkaConsumerConnector {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConsumerConnector for KafkaConsumerConnector {
    async fn connect(&self, topics: &[String]) -> EventBusResult<Arc<dyn ConsumerClient>> {
        self.config.validate_consumer()?;
        let consumer: StreamConsumer = self.config.consumer_client_config().create()?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topic_refs)?;

        info!(
            brokers = %self.config.brokers_string(),
            group = %self.config.consumer.group_id,
            topics = ?topics,
            "Kafka consumer subscribed"
        );

        let (stop_tx, _) = watch::channel(false);
        Ok(Arc::new(KafkaConsumerClient { consumer, stop_tx }))
    }
}

/// Consumer connection backed by librdkafka
pub struct KafkaConsumerClient {
    consumer: StreamConsumer,
    stop_tx: watch::Sender<bool>,
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    async fn recv(&self) -> Option<EventBusResult<BrokerRecord>> {
        let mut stopped = self.stop_tx.subscribe();
        if *stopped.borrow() {
            return None;
        }

        tokio::select! {
            _ = async { let _ = stopped.wait_for(|s| *s).await; } => None,
            message = self.consumer.recv() => Some(
                message
                    .map(|m| BrokerRecord {
                        topic: m.topic().to_string(),
                        partition: m.partition(),
                        offset: m.offset(),
                        key: m.key().map(<[u8]>::to_vec),
                        value: decode_message_value(m.payload()),
                    })
                    .map_err(EventBusError::from),
            ),
        }
    }

    async fn commit(&self, record: &BrokerRecord) -> EventBusResult<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))?;
        self.consumer.commit(&offsets, CommitMode::Async)?;

        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Committed offset"
        );
        Ok(())
    }

    fn stop(&self) {
        if self.stop_tx.send_replace(true) {
            return;
        }
        self.consumer.unsubscribe();
        info!("Kafka consumer stopped");
    }
}
