// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for miraveja-events
//!
//! Deterministic events, envelopes and fully wired factories for the
//! integration tests. Event ids and timestamps are fixed constants so that
//! envelopes compare equal across runs.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use miraveja_events::events::{EventHeader, MemberRegistered};
use miraveja_events::{
    register_builtin_events, EventDeserializer, EventFactory, EventTypeRegistry,
    InMemorySchemaRegistry, SchemaValidator,
};

pub const EVENT_ID_1: &str = "01934f4a-0001-7000-8000-000000000001";
pub const MEMBER_ID_1: &str = "member-0001";
pub const MEMBER_ID_2: &str = "member-0002";

// 2026-01-19T12:00:00Z
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("Invalid UUID in test fixture")
}

pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// MemberRegistered with a fixed id and timestamp
pub fn member_registered_fixture() -> MemberRegistered {
    MemberRegistered {
        header: EventHeader {
            id: parse_uuid(EVENT_ID_1),
            aggregate_type: "Member".to_string(),
            aggregate_id: MEMBER_ID_1.to_string(),
            occurred_at: fixed_timestamp(),
        },
        member_id: MEMBER_ID_1.to_string(),
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
    }
}

/// Wire envelope of [`member_registered_fixture`]
pub fn member_registered_envelope() -> Value {
    json!({
        "type": "member.registered",
        "version": 1,
        "payload": {
            "id": EVENT_ID_1,
            "aggregateType": "Member",
            "aggregateId": MEMBER_ID_1,
            "occurredAt": FIXED_TIMESTAMP,
            "memberId": MEMBER_ID_1,
            "email": "ada@example.com",
            "name": "Ada"
        }
    })
}

/// Schema for member.registered v1 requiring the member fields
pub fn member_registered_schema() -> Value {
    json!({
        "type": "object",
        "required": ["memberId", "email", "name"],
        "properties": {
            "memberId": { "type": "string", "minLength": 1 },
            "email": { "type": "string" },
            "name": { "type": "string" }
        }
    })
}

/// Registry holding every built-in event kind
pub fn builtin_registry() -> EventTypeRegistry {
    let mut registry = EventTypeRegistry::new();
    register_builtin_events(&mut registry).expect("built-in kinds register once");
    registry
}

/// Object schemas for every built-in kind, strict for member.registered
pub fn builtin_schemas() -> InMemorySchemaRegistry {
    builtin_registry()
        .descriptors()
        .into_iter()
        .fold(InMemorySchemaRegistry::new(), |schemas, descriptor| {
            let schema = if descriptor.event_type == "member.registered" {
                member_registered_schema()
            } else {
                json!({ "type": "object" })
            };
            schemas.with_schema(&descriptor.event_type, descriptor.version, schema)
        })
}

/// Factory wired with the built-in kinds and [`builtin_schemas`]
pub fn builtin_factory() -> EventFactory {
    EventFactory::new(
        SchemaValidator::new(Arc::new(builtin_schemas())),
        EventDeserializer::new(Arc::new(builtin_registry())),
    )
}
