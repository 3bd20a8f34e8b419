// Copyright (c) 2025 - Cowboy AI, Inc.
//! Envelope validation against JSON Schemas
//!
//! Only the `payload` part of an envelope is checked against the schema; `type`
//! and `version` select which schema applies.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::{EventBusError, EventBusResult};
use crate::events::envelope_key;
use crate::schema_registry::SchemaRegistry;

/// Validates raw envelopes using schemas from a [`SchemaRegistry`]
#[derive(Clone)]
pub struct SchemaValidator {
    schema_registry: Arc<dyn SchemaRegistry>,
}

impl SchemaValidator {
    pub fn new(schema_registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { schema_registry }
    }

    /// Validate an envelope
    ///
    /// Returns normally without touching the envelope when it is valid.
    pub async fn validate(&self, envelope: &Value) -> EventBusResult<()> {
        let (event_type, version) = envelope_key(envelope).map_err(|e| {
            error!(error = %e, "Rejected event envelope");
            e
        })?;

        let payload = match envelope.get("payload") {
            Some(payload) if !payload.is_null() => payload,
            _ => {
                error!(event_type = %event_type, version = version, "Event data missing 'payload' field.");
                return Err(EventBusError::SchemaValidation(
                    "Event data missing 'payload' field.".to_string(),
                ));
            }
        };

        let schema = self.schema_registry.get_schema(event_type, version).await?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            EventBusError::SchemaValidation(format!(
                "schema for '{}' v{} does not compile: {}",
                event_type, version, e
            ))
        })?;

        let violations: Vec<String> = validator
            .iter_errors(payload)
            .map(|violation| {
                let path = violation.instance_path.to_string();
                if path.is_empty() {
                    violation.to_string()
                } else {
                    format!("{} at {}", violation, path)
                }
            })
            .collect();

        if !violations.is_empty() {
            let message = violations.join("; ");
            error!(
                event_type = %event_type,
                version = version,
                violations = %message,
                "Event validation failed"
            );
            return Err(EventBusError::SchemaValidation(message));
        }

        debug!(event_type = %event_type, version = version, "Event validated");
        Ok(())
    }
}
