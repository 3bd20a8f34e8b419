// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event producer
//!
//! Publishes typed events to `{prefix}.{type}.v{version}` topics using the
//! aggregate id as the message key, so all events of one aggregate share a
//! partition.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --publish--> Connected --close--> Closed
//!   \________________close_________________/
//! ```
//!
//! The connection is opened on the first publish. A closed producer never
//! reconnects; publishing after [`EventProducer::close`] fails with
//! [`EventBusError::NotInitialized`].

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::{DeliveryReport, ProducerClient, ProducerConnector};
use crate::config::KafkaConfig;
use crate::errors::{EventBusError, EventBusResult};
use crate::events::Event;
use crate::kafka::KafkaProducerConnector;
use crate::topics;

enum ProducerState {
    Idle,
    Connected(Arc<dyn ProducerClient>),
    Closed,
}

/// An event the broker acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub event_id: Uuid,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// An event that could not be published
#[derive(Debug)]
pub struct PublishFailure {
    pub event_id: Uuid,
    pub topic: String,
    pub error: EventBusError,
}

/// Outcome of [`EventProducer::publish_all`]
#[derive(Debug, Default)]
pub struct BatchReport {
    pub delivered: Vec<PublishedEvent>,
    pub failures: Vec<PublishFailure>,
}

impl BatchReport {
    /// Whether every event of the batch was delivered
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Publishes events through a lazily opened broker connection
pub struct EventProducer {
    connector: Arc<dyn ProducerConnector>,
    topic_prefix: String,
    flush_timeout: Duration,
    state: RwLock<ProducerState>,
}

impl EventProducer {
    pub fn new(config: &KafkaConfig, connector: Arc<dyn ProducerConnector>) -> Self {
        Self {
            connector,
            topic_prefix: config.topic_prefix.clone(),
            flush_timeout: config.producer.timeout(),
            state: RwLock::new(ProducerState::Idle),
        }
    }

    /// Producer backed by a Kafka cluster
    pub fn kafka(config: &KafkaConfig) -> Self {
        Self::new(config, Arc::new(KafkaProducerConnector::new(config.clone())))
    }

    /// Whether a broker connection is currently open
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ProducerState::Connected(_))
    }

    async fn ensure_connected(&self) -> EventBusResult<()> {
        match *self.state.read().await {
            ProducerState::Connected(_) => return Ok(()),
            ProducerState::Closed => return Err(EventBusError::NotInitialized),
            ProducerState::Idle => {}
        }

        let mut state = self.state.write().await;
        match *state {
            ProducerState::Connected(_) => Ok(()),
            ProducerState::Closed => Err(EventBusError::NotInitialized),
            ProducerState::Idle => {
                let client = self.connector.connect().await.map_err(|e| {
                    error!(error = %e, "Failed to initialize producer");
                    e
                })?;
                *state = ProducerState::Connected(client);
                info!("Producer initialized");
                Ok(())
            }
        }
    }

    async fn send(&self, client: &dyn ProducerClient, event: &dyn Event) -> EventBusResult<PublishedEvent> {
        let topic = topics::topic_name(&self.topic_prefix, event.event_type(), event.version());
        let key = event.partition_key();
        let key = (!key.is_empty()).then_some(key);

        let payload = event.to_envelope()?.to_bytes()?;
        debug!(topic = %topic, event_id = %event.id(), size = payload.len(), "Publishing event");

        match client.send(&topic, key, payload).await {
            Ok(DeliveryReport { partition, offset }) => {
                info!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    event_id = %event.id(),
                    "Event published"
                );
                Ok(PublishedEvent {
                    event_id: event.id(),
                    topic,
                    partition,
                    offset,
                })
            }
            Err(e) => {
                error!(topic = %topic, event_id = %event.id(), error = %e, "Failed to publish event");
                Err(e)
            }
        }
    }

    /// Publish one event and wait for the broker acknowledgment
    pub async fn publish(&self, event: &dyn Event) -> EventBusResult<PublishedEvent> {
        self.ensure_connected().await?;

        let state = self.state.read().await;
        let ProducerState::Connected(client) = &*state else {
            return Err(EventBusError::NotInitialized);
        };
        self.send(client.as_ref(), event).await
    }

    /// Publish a batch, then flush
    ///
    /// Events of different aggregates are sent concurrently; events sharing an
    /// aggregate id are sent one after another in input order. A failed event
    /// does not stop the batch and is listed in the report. A failed flush
    /// fails the whole call.
    pub async fn publish_all(&self, events: &[Arc<dyn Event>]) -> EventBusResult<BatchReport> {
        if events.is_empty() {
            info!("No events to publish");
            return Ok(BatchReport::default());
        }

        self.ensure_connected().await?;
        let state = self.state.read().await;
        let ProducerState::Connected(client) = &*state else {
            return Err(EventBusError::NotInitialized);
        };

        info!(count = events.len(), "Publishing event batch");

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<&Arc<dyn Event>>> = Vec::new();
        for event in events {
            let slot = *index.entry(event.aggregate_id()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(event);
        }

        let outcomes = join_all(groups.into_iter().map(|group| async move {
            let mut outcomes = Vec::with_capacity(group.len());
            for event in group {
                let outcome = self.send(client.as_ref(), event.as_ref()).await;
                outcomes.push((event, outcome));
            }
            outcomes
        }))
        .await;

        let mut report = BatchReport::default();
        for (event, outcome) in outcomes.into_iter().flatten() {
            match outcome {
                Ok(published) => report.delivered.push(published),
                Err(error) => {
                    let topic = topics::topic_name(&self.topic_prefix, event.event_type(), event.version());
                    error!(event_id = %event.id(), topic = %topic, error = %error, "Batch event failed");
                    report.failures.push(PublishFailure {
                        event_id: event.id(),
                        topic,
                        error,
                    });
                }
            }
        }

        client.flush(self.flush_timeout).await.map_err(|e| {
            error!(error = %e, "Failed to flush event batch");
            e
        })?;

        info!(
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "Event batch published"
        );
        Ok(report)
    }

    /// Flush pending sends and release the connection
    ///
    /// Undelivered messages after the flush timeout are logged, not returned
    /// as an error. Repeat calls are no-ops.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut *state, ProducerState::Closed);

        let ProducerState::Connected(client) = previous else {
            debug!("Producer closed without an open connection");
            return;
        };

        if let Err(e) = client.flush(self.flush_timeout).await {
            warn!(error = %e, "Flush before close did not complete");
        }
        let pending = client.pending();
        if pending > 0 {
            warn!(pending = pending, "Closing producer with undelivered messages");
        } else {
            info!("All messages delivered before closing producer");
        }

        drop(client);
        info!("Producer closed");
    }
}
