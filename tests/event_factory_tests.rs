// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Factory Integration Tests
//!
//! User Story: As a consumer, I need raw envelopes turned into typed events
//! only when they are well formed, schema-valid and registered
//!
//! Test Requirements:
//! - Verify a valid envelope becomes the registered kind with identical fields
//! - Verify envelope key errors win over payload and schema errors
//! - Verify schema violations and unknown kinds are rejected
//! - Verify failures can be recorded as `event.exception.occurred`

mod fixtures;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;

use fixtures::*;
use miraveja_events::events::{
    ExceptionOccurred, ImageMetadataRegistered, MemberRegistered, VectorType, VectorsMerged,
};
use miraveja_events::{
    EventBusError, EventDeserializer, EventFactory, JsonFileSchemaRegistry, SchemaRegistry,
    SchemaValidator,
};

/// Test: A valid envelope becomes the registered kind with identical data
#[tokio::test]
async fn test_create_from_envelope_builds_typed_event() {
    // Given a factory wired with the built-in kinds
    let factory = builtin_factory();

    // When a member.registered envelope is processed
    let event = factory
        .create_from_envelope(&member_registered_envelope())
        .await
        .unwrap();

    // Then the instance is a MemberRegistered carrying the wire fields
    let registered = event.downcast_ref::<MemberRegistered>().unwrap();
    assert_eq!(registered, &member_registered_fixture());
    assert_eq!(event.partition_key(), MEMBER_ID_1.as_bytes());
}

/// Test: Creating twice from the same envelope yields equal events
#[tokio::test]
async fn test_create_from_envelope_is_repeatable() {
    let factory = builtin_factory();
    let envelope = member_registered_envelope();

    let first = factory.create_from_envelope(&envelope).await.unwrap();
    let second = factory.create_from_envelope(&envelope).await.unwrap();

    assert_eq!(
        first.downcast_ref::<MemberRegistered>(),
        second.downcast_ref::<MemberRegistered>()
    );
    assert_eq!(first.to_envelope().unwrap(), second.to_envelope().unwrap());
}

/// Test: A typed event survives the wire unchanged
#[tokio::test]
async fn test_envelope_of_typed_event_recreates_it() {
    let factory = builtin_factory();
    let original = member_registered_fixture();

    let envelope = miraveja_events::Event::to_envelope(&original)
        .unwrap()
        .to_value()
        .unwrap();
    assert_eq!(envelope, member_registered_envelope());

    let event = factory.create_from_envelope(&envelope).await.unwrap();
    assert_eq!(event.downcast_ref::<MemberRegistered>(), Some(&original));
}

/// Test: Numeric aggregate ids on the wire become strings
#[tokio::test]
async fn test_numeric_aggregate_id_is_accepted() {
    let factory = builtin_factory();
    let envelope = json!({
        "type": "image.metadata.registered",
        "version": 1,
        "payload": {
            "aggregateType": "ImageMetadata",
            "aggregateId": 42,
            "imageMetadataId": 42,
            "data": { "title": "Sunset" }
        }
    });

    let event = factory.create_from_envelope(&envelope).await.unwrap();

    assert_eq!(event.aggregate_id(), "42");
    let registered = event.downcast_ref::<ImageMetadataRegistered>().unwrap();
    assert_eq!(registered.data["title"], "Sunset");
}

/// Test: Vector events from the wire resolve to their registered kind
#[tokio::test]
async fn test_vector_merged_envelope_builds_typed_event() {
    let factory = builtin_factory();
    let envelope = json!({
        "type": "vector.merged",
        "version": 1,
        "payload": {
            "aggregateType": "vector",
            "aggregateId": "9",
            "vectorId": 9,
            "vectorType": "image",
            "sourceVectorIds": [3, 4]
        }
    });

    let event = factory.create_from_envelope(&envelope).await.unwrap();

    let merged = event.downcast_ref::<VectorsMerged>().unwrap();
    assert_eq!(merged.vector_type, VectorType::Image);
    assert_eq!(merged.source_vector_ids, vec![3, 4]);
    assert_eq!(event.partition_key(), b"9");
}

#[test_case(json!({"version": 1, "payload": {}}) ; "type absent")]
#[test_case(json!({"type": null, "version": 1, "payload": {}}) ; "type null")]
#[test_case(json!({"type": 7, "version": 1, "payload": {}}) ; "type not a string")]
#[tokio::test]
async fn test_missing_type_is_rejected(envelope: serde_json::Value) {
    let err = builtin_factory().create_from_envelope(&envelope).await.unwrap_err();
    assert!(matches!(err, EventBusError::MissingType), "got {err:?}");
}

#[test_case(json!({"type": "member.registered", "payload": {}}) ; "version absent")]
#[test_case(json!({"type": "member.registered", "version": 0, "payload": {}}) ; "version zero")]
#[test_case(json!({"type": "member.registered", "version": "1", "payload": {}}) ; "version as text")]
#[tokio::test]
async fn test_missing_version_is_rejected(envelope: serde_json::Value) {
    let err = builtin_factory().create_from_envelope(&envelope).await.unwrap_err();
    assert!(matches!(err, EventBusError::MissingVersion), "got {err:?}");
}

/// Test: Without a payload validation fails even for a permissive schema
#[tokio::test]
async fn test_missing_payload_fails_schema_validation() {
    let factory = builtin_factory();

    for envelope in [
        json!({"type": "member.activated", "version": 1}),
        json!({"type": "member.activated", "version": 1, "payload": null}),
    ] {
        let err = factory.create_from_envelope(&envelope).await.unwrap_err();
        match err {
            EventBusError::SchemaValidation(message) => {
                assert_eq!(message, "Event data missing 'payload' field.")
            }
            other => panic!("expected schema validation error, got {other:?}"),
        }
    }
}

/// Test: A payload violating its schema is reported with the failing field
#[tokio::test]
async fn test_schema_violation_is_rejected() {
    let factory = builtin_factory();
    let mut envelope = member_registered_envelope();
    envelope["payload"]["memberId"] = json!("");

    let err = factory.create_from_envelope(&envelope).await.unwrap_err();

    match err {
        EventBusError::SchemaValidation(message) => assert!(message.contains("memberId")),
        other => panic!("expected schema validation error, got {other:?}"),
    }
}

/// Test: A schema-valid payload still has to satisfy the kind's own checks
#[tokio::test]
async fn test_field_constraints_run_after_schema() {
    let factory = builtin_factory();
    let mut envelope = member_registered_envelope();
    envelope["payload"]["email"] = json!("not-an-email");

    let err = factory.create_from_envelope(&envelope).await.unwrap_err();

    assert!(matches!(err, EventBusError::InvalidEventData { .. }), "got {err:?}");
}

/// Test: Schema lookup happens before the registry lookup
#[tokio::test]
async fn test_unregistered_kind_without_schema_fails_on_schema() {
    let factory = builtin_factory();
    let envelope = json!({"type": "image.uploaded", "version": 1, "payload": {}});

    let err = factory.create_from_envelope(&envelope).await.unwrap_err();

    assert!(matches!(err, EventBusError::SchemaFileNotFound(_)), "got {err:?}");
}

/// Test: A kind with a schema but no registration is not found
#[tokio::test]
async fn test_unregistered_kind_with_schema_is_not_found() {
    let schemas = builtin_schemas().with_schema("image.uploaded", 1, json!({"type": "object"}));
    let factory = EventFactory::new(
        SchemaValidator::new(Arc::new(schemas)),
        EventDeserializer::new(Arc::new(builtin_registry())),
    );
    let envelope = json!({"type": "image.uploaded", "version": 1, "payload": {}});

    let err = factory.create_from_envelope(&envelope).await.unwrap_err();

    match err {
        EventBusError::NotFound { event_type, version } => {
            assert_eq!(event_type, "image.uploaded");
            assert_eq!(version, 1);
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test_case("" ; "empty text")]
#[test_case("{\"type\": " ; "truncated")]
#[tokio::test]
async fn test_malformed_json_text_is_rejected(text: &str) {
    let err = builtin_factory().create_from_json(text).await.unwrap_err();
    assert!(matches!(err, EventBusError::InvalidJson(_)), "got {err:?}");
}

/// Test: JSON text goes through the same path as parsed envelopes
#[tokio::test]
async fn test_create_from_json_text() {
    let text = member_registered_envelope().to_string();

    let event = builtin_factory().create_from_json(&text).await.unwrap();

    assert!(event.is::<MemberRegistered>());
}

/// Test: Failures become exception events carrying the error code
#[tokio::test]
async fn test_failure_is_recorded_as_exception_event() {
    let factory = builtin_factory();
    let failure = factory
        .create_from_envelope(&json!({"version": 1}))
        .await
        .unwrap_err();

    let exception: ExceptionOccurred = factory.create_from_error(&failure);

    assert_eq!(exception.exception_message, "Event data missing 'type' field.");
    assert_eq!(exception.exception_code, failure.code());
    assert_eq!(exception.header.aggregate_type, "event");

    // The exception event is itself a valid envelope
    let envelope = miraveja_events::Event::to_envelope(&exception)
        .unwrap()
        .to_value()
        .unwrap();
    let event = factory.create_from_envelope(&envelope).await.unwrap();
    assert!(event.is::<ExceptionOccurred>());
}

/// Test: Schemas stored as files are found by topic name
#[tokio::test]
async fn test_file_schema_registry_backs_the_validator() {
    // Given a schema directory populated through the registry
    let dir = TempDir::new().unwrap();
    let schemas = JsonFileSchemaRegistry::new(dir.path(), "miraveja");
    schemas
        .register_schema("member.registered", 1, member_registered_schema())
        .await
        .unwrap();
    assert!(dir.path().join("miraveja.member.registered.v1.json").exists());

    let factory = EventFactory::new(
        SchemaValidator::new(Arc::new(schemas)),
        EventDeserializer::new(Arc::new(builtin_registry())),
    );

    // When a valid and an invalid envelope are processed
    let valid = factory.create_from_envelope(&member_registered_envelope()).await;
    let mut invalid = member_registered_envelope();
    invalid["payload"].as_object_mut().unwrap().remove("name");
    let invalid = factory.create_from_envelope(&invalid).await;

    // Then only the valid one becomes an event
    assert!(valid.is_ok());
    assert!(matches!(invalid, Err(EventBusError::SchemaValidation(_))));
}
