// Copyright (c) 2025 - Cowboy AI, Inc.
//! Broker seam
//!
//! The producer and the consumer own the lifecycle and the event semantics.
//! Everything that touches the wire goes through the traits here, implemented
//! by [`crate::kafka`] for a real cluster and by [`crate::memory`] for tests
//! and local runs.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::errors::EventBusResult;

/// One message as received by a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Decoded message value; `{}` when the bytes were not a JSON envelope
    pub value: Value,
}

/// Where the broker stored a sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub partition: i32,
    pub offset: i64,
}

/// Opens producer connections
#[async_trait]
pub trait ProducerConnector: Send + Sync {
    async fn connect(&self) -> EventBusResult<Arc<dyn ProducerClient>>;
}

/// A live producer connection
#[async_trait]
pub trait ProducerClient: Send + Sync {
    /// Send one message and wait for the broker acknowledgment
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: Vec<u8>,
    ) -> EventBusResult<DeliveryReport>;

    /// Wait until pending messages are delivered or the timeout expires
    async fn flush(&self, timeout: Duration) -> EventBusResult<()>;

    /// Messages not yet acknowledged by the broker
    fn pending(&self) -> usize;
}

/// Opens consumer connections subscribed to a set of topics
#[async_trait]
pub trait ConsumerConnector: Send + Sync {
    async fn connect(&self, topics: &[String]) -> EventBusResult<Arc<dyn ConsumerClient>>;
}

/// A live consumer connection
#[async_trait]
pub trait ConsumerClient: Send + Sync {
    /// Next record; `None` once the connection is stopped or the stream ends
    async fn recv(&self) -> Option<EventBusResult<BrokerRecord>>;

    /// Commit the offset following `record` for the consumer group
    async fn commit(&self, record: &BrokerRecord) -> EventBusResult<()>;

    /// Leave the group and release the connection
    ///
    /// Synchronous so it can run from a drop guard; repeat calls are no-ops.
    fn stop(&self);
}

/// Decode a message value into a JSON envelope
///
/// Never fails: bytes that are absent or not valid JSON decode to an empty
/// object, which the factory then rejects as an envelope without a type.
pub fn decode_message_value(bytes: Option<&[u8]>) -> Value {
    let Some(bytes) = bytes else {
        return Value::Object(Map::new());
    };

    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, size = bytes.len(), "Failed to decode message value");
            Value::Object(Map::new())
        }
    }
}
