// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event dispatcher
//!
//! Application-facing entry point for publishing. Use cases hand their
//! events to the dispatcher, which forwards them to the [`EventProducer`] and
//! logs the outcome. Errors are returned unchanged.
//!
//! ```text
//! Use case → EventDispatcher → EventProducer → Kafka
//! ```

use std::sync::Arc;
use tracing::{error, info};

use crate::errors::EventBusResult;
use crate::events::Event;
use crate::producer::{BatchReport, EventProducer, PublishedEvent};

/// Forwards application events to a producer
#[derive(Clone)]
pub struct EventDispatcher {
    producer: Arc<EventProducer>,
}

impl EventDispatcher {
    pub fn new(producer: Arc<EventProducer>) -> Self {
        Self { producer }
    }

    pub fn producer(&self) -> &Arc<EventProducer> {
        &self.producer
    }

    /// Publish one event
    pub async fn dispatch(&self, event: &dyn Event) -> EventBusResult<PublishedEvent> {
        match self.producer.publish(event).await {
            Ok(published) => {
                info!(
                    event_type = event.event_type(),
                    event_id = %event.id(),
                    topic = %published.topic,
                    "Dispatched event"
                );
                Ok(published)
            }
            Err(e) => {
                error!(
                    event_type = event.event_type(),
                    event_id = %event.id(),
                    error = %e,
                    "Failed to dispatch event"
                );
                Err(e)
            }
        }
    }

    /// Publish a batch; see [`EventProducer::publish_all`]
    pub async fn dispatch_all(&self, events: &[Arc<dyn Event>]) -> EventBusResult<BatchReport> {
        match self.producer.publish_all(events).await {
            Ok(report) => {
                info!(
                    count = events.len(),
                    failed = report.failures.len(),
                    "Dispatched event batch"
                );
                Ok(report)
            }
            Err(e) => {
                error!(count = events.len(), error = %e, "Failed to dispatch event batch");
                Err(e)
            }
        }
    }
}
