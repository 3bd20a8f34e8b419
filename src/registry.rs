// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event type registry
//!
//! Maps `(type, version)` to the Rust type that represents that event kind.
//! The registry is filled once during application wiring and then shared
//! read-only (usually behind an `Arc`) with the deserializer and the consumer.
//!
//! ```rust
//! use miraveja_events::events::MemberRegistered;
//! use miraveja_events::registry::EventTypeRegistry;
//!
//! let mut registry = EventTypeRegistry::new();
//! registry.register::<MemberRegistered>().unwrap();
//!
//! let descriptor = registry.resolve("member.registered", 1).unwrap();
//! assert!(descriptor.type_name.ends_with("MemberRegistered"));
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{EventBusError, EventBusResult};
use crate::events::{DomainEvent, Event};
use crate::topics;

/// Builds an event instance from a flat payload
pub type EventConstructor = fn(&str, u32, Value) -> EventBusResult<Arc<dyn Event>>;

/// Registry entry for one event kind
#[derive(Clone)]
pub struct EventDescriptor {
    pub event_type: String,
    pub version: u32,
    /// Rust type name of the kind, for diagnostics
    pub type_name: &'static str,
    construct: EventConstructor,
}

impl EventDescriptor {
    /// Build a typed instance from a payload, applying the kind's field constraints
    pub fn construct(&self, payload: Value) -> EventBusResult<Arc<dyn Event>> {
        (self.construct)(&self.event_type, self.version, payload)
    }
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("event_type", &self.event_type)
            .field("version", &self.version)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn construct_kind<E: DomainEvent>(
    event_type: &str,
    version: u32,
    payload: Value,
) -> EventBusResult<Arc<dyn Event>> {
    let invalid = |reason: String| EventBusError::InvalidEventData {
        event_type: event_type.to_string(),
        version,
        reason,
    };

    let event: E = serde_json::from_value(payload).map_err(|e| invalid(e.to_string()))?;
    event.check().map_err(invalid)?;
    Ok(Arc::new(event))
}

/// Write-once mapping from `(type, version)` to event kind
#[derive(Debug, Default, Clone)]
pub struct EventTypeRegistry {
    entries: HashMap<(String, u32), EventDescriptor>,
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `E` under its own type and version
    pub fn register<E: DomainEvent>(&mut self) -> EventBusResult<()> {
        self.register_as::<E>(E::EVENT_TYPE, E::VERSION)
    }

    /// Register `E` under an explicit key
    ///
    /// Fails with [`EventBusError::AlreadyRegistered`] when the key is taken;
    /// the existing entry is left untouched.
    pub fn register_as<E: DomainEvent>(
        &mut self,
        event_type: &str,
        version: u32,
    ) -> EventBusResult<()> {
        if version == 0 {
            return Err(EventBusError::Configuration(format!(
                "Event type '{}' must have a positive version",
                event_type
            )));
        }

        let key = (event_type.to_string(), version);
        if self.entries.contains_key(&key) {
            return Err(EventBusError::AlreadyRegistered {
                event_type: event_type.to_string(),
                version,
            });
        }

        let descriptor = EventDescriptor {
            event_type: event_type.to_string(),
            version,
            type_name: std::any::type_name::<E>(),
            construct: construct_kind::<E>,
        };

        info!(
            event_type = %event_type,
            version = version,
            type_name = descriptor.type_name,
            "Registered event type"
        );

        self.entries.insert(key, descriptor);
        Ok(())
    }

    /// Look up the kind registered for `(type, version)`
    pub fn resolve(&self, event_type: &str, version: u32) -> EventBusResult<&EventDescriptor> {
        let descriptor = self
            .entries
            .get(&(event_type.to_string(), version))
            .ok_or_else(|| EventBusError::NotFound {
                event_type: event_type.to_string(),
                version,
            })?;

        debug!(
            event_type = %event_type,
            version = version,
            type_name = descriptor.type_name,
            "Resolved event type"
        );
        Ok(descriptor)
    }

    /// Look up the kind for a topic name
    ///
    /// The version comes from the `.v{N}` suffix. The type goes through the
    /// lossy topic extraction, so kinds whose type contains `.` are only found
    /// here if they were also registered under the collapsed name.
    pub fn resolve_from_topic(&self, prefix: &str, topic: &str) -> EventBusResult<&EventDescriptor> {
        let version = topics::version_from_topic(topic).ok_or_else(|| EventBusError::NotFound {
            event_type: topic.to_string(),
            version: 0,
        })?;
        let event_type = topics::event_type_from_topic(prefix, topic, version);
        self.resolve(&event_type, version)
    }

    /// Whether `(type, version)` is registered
    pub fn contains(&self, event_type: &str, version: u32) -> bool {
        self.entries.contains_key(&(event_type.to_string(), version))
    }

    /// All registered descriptors, ordered by type then version
    pub fn descriptors(&self) -> Vec<&EventDescriptor> {
        let mut all: Vec<&EventDescriptor> = self.entries.values().collect();
        all.sort_by(|a, b| (&a.event_type, a.version).cmp(&(&b.event_type, b.version)));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemberActivated, MemberRegistered};
    use serde_json::json;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = EventTypeRegistry::new();
        registry.register::<MemberRegistered>().unwrap();

        let descriptor = registry.resolve("member.registered", 1).unwrap();
        assert_eq!(descriptor.event_type, "member.registered");
        assert_eq!(descriptor.version, 1);
        assert_eq!(descriptor.type_name, std::any::type_name::<MemberRegistered>());
    }

    #[test]
    fn test_duplicate_registration_keeps_first_entry() {
        let mut registry = EventTypeRegistry::new();
        registry.register::<MemberRegistered>().unwrap();

        let err = registry
            .register_as::<MemberActivated>("member.registered", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            EventBusError::AlreadyRegistered { ref event_type, version: 1 } if event_type == "member.registered"
        ));

        let descriptor = registry.resolve("member.registered", 1).unwrap();
        assert_eq!(descriptor.type_name, std::any::type_name::<MemberRegistered>());
    }

    #[test]
    fn test_same_type_different_versions_coexist() {
        let mut registry = EventTypeRegistry::new();
        registry.register::<MemberRegistered>().unwrap();
        registry
            .register_as::<MemberRegistered>("member.registered", 2)
            .unwrap();

        assert!(registry.contains("member.registered", 1));
        assert!(registry.contains("member.registered", 2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = EventTypeRegistry::new();
        let err = registry.resolve("member.registered", 1).unwrap_err();
        assert!(matches!(err, EventBusError::NotFound { .. }));
    }

    #[test]
    fn test_zero_version_rejected() {
        let mut registry = EventTypeRegistry::new();
        let err = registry
            .register_as::<MemberRegistered>("member.registered", 0)
            .unwrap_err();
        assert!(matches!(err, EventBusError::Configuration(_)));
    }

    #[test]
    fn test_resolve_from_topic_uses_collapsed_type() {
        let mut registry = EventTypeRegistry::new();
        registry.register::<MemberRegistered>().unwrap();

        // Dotted types collapse on the way back from a topic name
        let err = registry
            .resolve_from_topic("miraveja", "miraveja.member.registered.v1")
            .unwrap_err();
        assert!(matches!(
            err,
            EventBusError::NotFound { ref event_type, version: 1 } if event_type == "memberregistered"
        ));

        registry
            .register_as::<MemberRegistered>("memberregistered", 1)
            .unwrap();
        let descriptor = registry
            .resolve_from_topic("miraveja", "miraveja.member.registered.v1")
            .unwrap();
        assert_eq!(descriptor.event_type, "memberregistered");
    }

    #[test]
    fn test_construct_applies_field_constraints() {
        let mut registry = EventTypeRegistry::new();
        registry.register::<MemberRegistered>().unwrap();
        let descriptor = registry.resolve("member.registered", 1).unwrap();

        let event = descriptor
            .construct(json!({
                "aggregateType": "Member",
                "aggregateId": "m-1",
                "memberId": "m-1",
                "email": "ana@example.com",
                "name": "Ana"
            }))
            .unwrap();
        assert_eq!(event.aggregate_id(), "m-1");

        let err = descriptor
            .construct(json!({
                "aggregateType": "Member",
                "aggregateId": "m-1",
                "memberId": "m-1",
                "email": "nope",
                "name": "Ana"
            }))
            .unwrap_err();
        assert!(matches!(err, EventBusError::InvalidEventData { .. }));
    }
}
