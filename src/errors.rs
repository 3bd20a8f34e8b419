// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for event bus operations

use thiserror::Error;

/// Errors that can occur while registering, validating, publishing or
/// consuming domain events
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Envelope has no `type` field
    #[error("Event data missing 'type' field.")]
    MissingType,

    /// Envelope has no `version` field
    #[error("Event data missing 'version' field.")]
    MissingVersion,

    /// Payload is absent or does not satisfy its JSON Schema
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// No event kind registered for the key
    #[error("Event type '{event_type}' with version '{version}' not found in the registry.")]
    NotFound { event_type: String, version: u32 },

    /// Event kind was registered twice
    #[error("Event type '{event_type}' with version '{version}' is already registered.")]
    AlreadyRegistered { event_type: String, version: u32 },

    /// Wire text is not valid JSON
    #[error("Invalid JSON string provided for event creation: {0}")]
    InvalidJson(String),

    /// Payload passed the schema but violates the event kind's own field constraints
    #[error("Invalid data for event '{event_type}' v{version}: {reason}")]
    InvalidEventData {
        event_type: String,
        version: u32,
        reason: String,
    },

    /// Producer used after its broker connection was torn down
    #[error("Kafka producer is not initialized.")]
    NotInitialized,

    /// Broker-level transport failure
    #[error("Kafka error: {0}")]
    Broker(String),

    /// Consumer `start` called while a receive loop is already running
    #[error("Kafka consumer is already running.")]
    AlreadyRunning,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Schema directory does not exist
    #[error("Schemas directory not found at path: {0}")]
    SchemasDirectoryNotFound(String),

    /// Schema file for an event kind does not exist
    #[error("Schema file not found at path: {0}")]
    SchemaFileNotFound(String),

    /// Schema file exists but is not valid JSON
    #[error("Invalid JSON in schema file at path: {path}. Error: {message}")]
    InvalidSchemaJson { path: String, message: String },

    /// Subscriber handler failed
    #[error("Handler error: {0}")]
    Handler(String),
}

impl EventBusError {
    /// Stable numeric code carried by `event.exception.occurred` events
    pub fn code(&self) -> i64 {
        match self {
            EventBusError::MissingType => 1001,
            EventBusError::MissingVersion => 1002,
            EventBusError::SchemaValidation(_) => 1003,
            EventBusError::NotFound { .. } => 1004,
            EventBusError::AlreadyRegistered { .. } => 1005,
            EventBusError::InvalidJson(_) => 1006,
            EventBusError::InvalidEventData { .. } => 1007,
            EventBusError::NotInitialized => 2001,
            EventBusError::Broker(_) => 2002,
            EventBusError::Timeout(_) => 2003,
            EventBusError::AlreadyRunning => 2004,
            EventBusError::Serialization(_) => 3001,
            EventBusError::Configuration(_) => 3002,
            EventBusError::SchemasDirectoryNotFound(_) => 4001,
            EventBusError::SchemaFileNotFound(_) => 4002,
            EventBusError::InvalidSchemaJson { .. } => 4003,
            EventBusError::Handler(_) => 5001,
        }
    }
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

impl From<rdkafka::error::KafkaError> for EventBusError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        EventBusError::Broker(err.to_string())
    }
}

impl From<serde_json::Error> for EventBusError {
    fn from(err: serde_json::Error) -> Self {
        EventBusError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EventBusError::AlreadyRegistered {
            event_type: "member.registered".to_string(),
            version: 1,
        };
        assert_eq!(
            err.to_string(),
            "Event type 'member.registered' with version '1' is already registered."
        );
        assert_eq!(
            EventBusError::MissingType.to_string(),
            "Event data missing 'type' field."
        );
    }

    #[test]
    fn test_codes_are_distinct_per_family() {
        assert_ne!(EventBusError::MissingType.code(), EventBusError::MissingVersion.code());
        assert_eq!(EventBusError::Broker("down".into()).code(), 2002);
        assert_eq!(EventBusError::AlreadyRunning.code(), 2004);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: EventBusError = json_err.into();
        assert!(matches!(err, EventBusError::Serialization(_)));
    }
}
