// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain Events
//!
//! This module defines the event model shared by the producer and the consumer.
//! Events are immutable facts; once constructed they are published once and
//! then dropped.
//!
//! # Event Kinds
//!
//! An event kind is a Rust type implementing [`DomainEvent`]. It carries a fixed
//! `EVENT_TYPE` string and a fixed positive `VERSION`. The same type string may
//! exist under several versions; each `(type, version)` pair is a distinct kind
//! with its own topic and its own JSON Schema.
//!
//! # Wire Format
//!
//! ```text
//! {
//!   "type": "member.registered",
//!   "version": 1,
//!   "payload": {
//!     "id": "...", "aggregateType": "Member", "aggregateId": "42",
//!     "occurredAt": "2026-01-19T12:00:00Z",
//!     ...kind-specific fields
//!   }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! The consumer does not know statically which kind a message holds. It resolves
//! the kind through the registry and receives an `Arc<dyn Event>`; subscribers
//! downcast to the concrete kind with [`downcast_ref`](trait.Event.html#method.downcast_ref).
//!
//! # Module Organization
//!
//! - [`exception`] - `event.exception.occurred`, the cross-cutting failure event
//! - [`member`] - Member aggregate events
//! - [`gallery`] - ImageMetadata aggregate events
//! - [`vector`] - embedding vector events

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use uuid::Uuid;

use crate::errors::{EventBusError, EventBusResult};
use crate::registry::EventTypeRegistry;

pub mod exception;
pub mod gallery;
pub mod member;
pub mod vector;

pub use exception::ExceptionOccurred;
pub use gallery::{
    ImageMetadataRegistered, ImageMetadataUpdated, ImageThumbnailSet, ImageVectorIdAssigned,
    ImageVectorIdUnassigned,
};
pub use member::{
    MemberActivated, MemberConnected, MemberDeactivated, MemberFollowed, MemberFriendAdded,
    MemberFriendRemoved, MemberIdentityUpdated, MemberProfileUpdated, MemberRegistered,
    MemberUnfollowed,
};
pub use vector::{VectorCreated, VectorType, VectorUpdated, VectorsMerged};

/// Fields every event instance carries, flattened into the wire payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    /// Unique event identifier (UUID v7 for time ordering)
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,

    /// Category of the originating entity, e.g. "Member"
    pub aggregate_type: String,

    /// Identity of the originating entity; also the partition key
    #[serde(deserialize_with = "aggregate_id_from_json")]
    pub aggregate_id: String,

    /// When this event occurred
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl EventHeader {
    /// Create a header with a fresh id and the current time
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Aggregate ids arrive as strings or, for numeric aggregates, as integers
fn aggregate_id_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// A statically known event kind
///
/// Implementors are plain serde structs that flatten an [`EventHeader`] next to
/// their own camelCase fields.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Event type string, e.g. "member.registered"
    const EVENT_TYPE: &'static str;

    /// Schema version, starting at 1
    const VERSION: u32;

    /// Common event fields
    fn header(&self) -> &EventHeader;

    /// Field constraints that serde cannot express
    ///
    /// Runs after deserialization; the message is returned as the reason of an
    /// [`EventBusError::InvalidEventData`].
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Object-safe view of an event instance
///
/// Implemented for every [`DomainEvent`]; this is what flows through the
/// producer, the factory and subscriber callbacks.
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Event type string
    fn event_type(&self) -> &'static str;

    /// Schema version
    fn version(&self) -> u32;

    /// Unique event identifier
    fn id(&self) -> Uuid;

    /// Category of the originating entity
    fn aggregate_type(&self) -> &str;

    /// Identity of the originating entity
    fn aggregate_id(&self) -> &str;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Flat JSON payload (header and kind-specific fields)
    fn payload(&self) -> EventBusResult<Value>;

    /// Upcast for downcasting to the concrete kind
    fn as_any(&self) -> &dyn Any;

    /// Wire envelope for this event
    fn to_envelope(&self) -> EventBusResult<Envelope> {
        Ok(Envelope {
            event_type: self.event_type().to_string(),
            version: self.version(),
            payload: self.payload()?,
        })
    }
}

impl<T: DomainEvent> Event for T {
    fn event_type(&self) -> &'static str {
        T::EVENT_TYPE
    }

    fn version(&self) -> u32 {
        T::VERSION
    }

    fn id(&self) -> Uuid {
        self.header().id
    }

    fn aggregate_type(&self) -> &str {
        &self.header().aggregate_type
    }

    fn aggregate_id(&self) -> &str {
        &self.header().aggregate_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.header().occurred_at
    }

    fn payload(&self) -> EventBusResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Event {
    /// Borrow the concrete event kind, if this instance is one
    pub fn downcast_ref<T: DomainEvent>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether this instance is of kind `T`
    pub fn is<T: DomainEvent>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Broker message key: the UTF-8 bytes of the aggregate id
    pub fn partition_key(&self) -> &[u8] {
        self.aggregate_id().as_bytes()
    }
}

/// Wire representation of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type string
    #[serde(rename = "type")]
    pub event_type: String,

    /// Schema version
    pub version: u32,

    /// Flat payload
    pub payload: Value,
}

impl Envelope {
    /// Serialize to UTF-8 JSON bytes
    pub fn to_bytes(&self) -> EventBusResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serialize to a JSON value (the raw form the validator accepts)
    pub fn to_value(&self) -> EventBusResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Read `type` and `version` from a raw envelope
///
/// A `type` that is absent, null or not a string is [`EventBusError::MissingType`];
/// a `version` that is absent, null or not a positive `u32` is
/// [`EventBusError::MissingVersion`].
pub fn envelope_key(raw: &Value) -> EventBusResult<(&str, u32)> {
    let event_type = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or(EventBusError::MissingType)?;

    let version = raw
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or(EventBusError::MissingVersion)?;

    Ok((event_type, version))
}

/// Register every event kind this crate defines
///
/// Call once during application wiring, before any traffic.
pub fn register_builtin_events(registry: &mut EventTypeRegistry) -> EventBusResult<()> {
    registry.register::<ExceptionOccurred>()?;

    registry.register::<MemberRegistered>()?;
    registry.register::<MemberActivated>()?;
    registry.register::<MemberDeactivated>()?;
    registry.register::<MemberProfileUpdated>()?;
    registry.register::<MemberIdentityUpdated>()?;
    registry.register::<MemberFriendAdded>()?;
    registry.register::<MemberFriendRemoved>()?;
    registry.register::<MemberFollowed>()?;
    registry.register::<MemberUnfollowed>()?;
    registry.register::<MemberConnected>()?;

    registry.register::<ImageMetadataRegistered>()?;
    registry.register::<ImageMetadataUpdated>()?;
    registry.register::<ImageVectorIdAssigned>()?;
    registry.register::<ImageVectorIdUnassigned>()?;
    registry.register::<ImageThumbnailSet>()?;

    registry.register::<VectorCreated>()?;
    registry.register::<VectorUpdated>()?;
    registry.register::<VectorsMerged>()?;

    Ok(())
}

/// Reject empty identifier fields in [`DomainEvent::check`] implementations
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{}' must not be empty", field))
    } else {
        Ok(())
    }
}
