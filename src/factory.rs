// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event factory
//!
//! Composes the validator and the deserializer: wire data is always validated
//! before it becomes a typed event. Also turns failures into
//! `event.exception.occurred` events for reporting on the bus.

use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::deserializer::EventDeserializer;
use crate::errors::{EventBusError, EventBusResult};
use crate::events::{Event, ExceptionOccurred};
use crate::validator::SchemaValidator;

/// Raw data to typed event
#[derive(Clone)]
pub struct EventFactory {
    validator: SchemaValidator,
    deserializer: EventDeserializer,
}

impl EventFactory {
    pub fn new(validator: SchemaValidator, deserializer: EventDeserializer) -> Self {
        Self {
            validator,
            deserializer,
        }
    }

    pub fn deserializer(&self) -> &EventDeserializer {
        &self.deserializer
    }

    /// Validate then deserialize a parsed envelope
    pub async fn create_from_envelope(&self, envelope: &Value) -> EventBusResult<Arc<dyn Event>> {
        self.validator.validate(envelope).await?;
        self.deserializer.deserialize(envelope)
    }

    /// Parse JSON text, then validate and deserialize it
    ///
    /// Malformed or empty text fails with [`EventBusError::InvalidJson`].
    pub async fn create_from_json(&self, text: &str) -> EventBusResult<Arc<dyn Event>> {
        let envelope: Value = serde_json::from_str(text).map_err(|e| {
            warn!(error = %e, "Invalid JSON string provided for event creation");
            EventBusError::InvalidJson(e.to_string())
        })?;
        self.create_from_envelope(&envelope).await
    }

    /// Wrap any error into an `event.exception.occurred` event
    ///
    /// Does not consult the registry.
    pub fn create_from_failure(
        &self,
        failure: &(dyn StdError + 'static),
        code: i64,
    ) -> ExceptionOccurred {
        error!(error = %failure, code = code, "Recording failure as event");
        ExceptionOccurred::create(failure.to_string(), code)
    }

    /// Wrap an event bus error, using its stable code
    pub fn create_from_error(&self, failure: &EventBusError) -> ExceptionOccurred {
        self.create_from_failure(failure, failure.code())
    }
}
