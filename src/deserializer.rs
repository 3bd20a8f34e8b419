// Copyright (c) 2025 - Cowboy AI, Inc.
//! Raw envelope to typed event

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::{EventBusError, EventBusResult};
use crate::events::{envelope_key, Event};
use crate::registry::EventTypeRegistry;

/// Turns envelopes into event instances using the registry
///
/// Usable on its own: it repeats the structural checks of the validator but
/// not the schema check.
#[derive(Debug, Clone)]
pub struct EventDeserializer {
    registry: Arc<EventTypeRegistry>,
}

impl EventDeserializer {
    pub fn new(registry: Arc<EventTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EventTypeRegistry {
        &self.registry
    }

    /// Build the typed event an envelope describes
    pub fn deserialize(&self, envelope: &Value) -> EventBusResult<Arc<dyn Event>> {
        let (event_type, version) = envelope_key(envelope).map_err(|e| {
            error!(error = %e, "Cannot deserialize event envelope");
            e
        })?;

        let payload = match envelope.get("payload") {
            Some(payload) if !payload.is_null() => payload.clone(),
            _ => {
                error!(event_type = %event_type, version = version, "Event data missing 'payload' field.");
                return Err(EventBusError::SchemaValidation(
                    "Event data missing 'payload' field.".to_string(),
                ));
            }
        };

        let event = self.registry.resolve(event_type, version)?.construct(payload)?;

        debug!(
            event_type = %event_type,
            version = version,
            event_id = %event.id(),
            "Event deserialized"
        );
        Ok(event)
    }
}
