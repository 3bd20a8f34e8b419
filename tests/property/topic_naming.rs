// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Topic Naming and Routing

use miraveja_events::events::envelope_key;
use miraveja_events::topics::{event_type_from_topic, topic_name, version_from_topic};
use miraveja_events::InMemoryBroker;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies
// ============================================================================

fn prefix() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

fn event_type() -> impl Strategy<Value = String> {
    "[A-Za-z_]{1,10}(\\.[A-Za-z_]{1,10}){0,3}"
}

// ============================================================================
// Topic names
// ============================================================================

proptest! {
    /// Topic names are always lowercase and end with the version segment
    #[test]
    fn prop_topic_name_layout(prefix in prefix(), event_type in event_type(), version in 1u32..1000) {
        let topic = topic_name(&prefix, &event_type, version);

        let head = format!("{}.", prefix);
        let tail = format!(".v{}", version);
        prop_assert!(topic.starts_with(&head));
        prop_assert!(topic.ends_with(&tail));
        prop_assert_eq!(topic.clone(), topic.to_lowercase());
        prop_assert_eq!(version_from_topic(&topic), Some(version));
    }

    /// Extraction returns the lowercased type with separators removed
    #[test]
    fn prop_extraction_drops_separators(prefix in prefix(), event_type in event_type(), version in 1u32..1000) {
        let topic = topic_name(&prefix, &event_type, version);

        let extracted = event_type_from_topic(&prefix, &topic, version);

        prop_assert_eq!(extracted, event_type.to_lowercase().replace('.', ""));
    }

    /// Single-segment types survive the round trip exactly
    #[test]
    fn prop_single_segment_types_round_trip(prefix in prefix(), event_type in "[a-z_]{1,16}", version in 1u32..1000) {
        let topic = topic_name(&prefix, &event_type, version);
        prop_assert_eq!(event_type_from_topic(&prefix, &topic, version), event_type);
    }

    /// Topics from another prefix come back unchanged
    #[test]
    fn prop_foreign_prefix_is_left_alone(event_type in event_type(), version in 1u32..1000) {
        let topic = topic_name("other", &event_type, version);
        prop_assert_eq!(event_type_from_topic("miraveja", &topic, version), topic);
    }
}

// ============================================================================
// Envelope keys
// ============================================================================

proptest! {
    /// Any string type with a positive version is accepted as is
    #[test]
    fn prop_envelope_key_accepts_valid_keys(event_type in ".{0,32}", version in 1u32..=u32::MAX) {
        let envelope = json!({ "type": event_type, "version": version, "payload": {} });

        let (parsed_type, parsed_version) = envelope_key(&envelope).unwrap();

        prop_assert_eq!(parsed_type, event_type.as_str());
        prop_assert_eq!(parsed_version, version);
    }

    /// Versions outside 1..=u32::MAX are rejected
    #[test]
    fn prop_envelope_key_rejects_out_of_range_versions(version in prop_oneof![Just(0i64), (u32::MAX as i64 + 1)..i64::MAX, i64::MIN..0]) {
        let envelope = json!({ "type": "member.registered", "version": version });
        prop_assert!(envelope_key(&envelope).is_err());
    }
}

// ============================================================================
// Partitioning
// ============================================================================

proptest! {
    /// Equal keys always map to the same partition, within range
    #[test]
    fn prop_keys_map_to_a_stable_partition(partitions in 1i32..16, key in proptest::collection::vec(any::<u8>(), 0..32)) {
        let broker = InMemoryBroker::new(partitions);

        let first = broker.partition_for(Some(key.as_slice()));
        let second = broker.partition_for(Some(key.as_slice()));

        prop_assert_eq!(first, second);
        prop_assert!((0..partitions).contains(&first));
    }
}
