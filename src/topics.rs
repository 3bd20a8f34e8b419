// Copyright (c) 2025 - Cowboy AI, Inc.

//! Kafka topic naming for versioned event kinds
//!
//! Every event kind is published to its own topic:
//!
//! ```text
//! {prefix}.{type-lowercased}.v{version}
//! ```
//!
//! The reverse direction is lossy. Extracting the event type strips the prefix
//! and the version suffix and then drops the remaining `.` separators, so a
//! multi-segment type such as `user.created` comes back as `usercreated`.
//! Callers that need the exact type must keep it alongside the topic.
//!
//! # Examples
//!
//! ```rust
//! use miraveja_events::topics::{event_type_from_topic, topic_name};
//!
//! let topic = topic_name("miraveja", "Member.Registered", 1);
//! assert_eq!(topic, "miraveja.member.registered.v1");
//!
//! assert_eq!(event_type_from_topic("miraveja", &topic, 1), "memberregistered");
//! ```

/// Build the topic name for an event kind
pub fn topic_name(prefix: &str, event_type: &str, version: u32) -> String {
    format!("{}.{}.v{}", prefix, event_type.to_lowercase(), version)
}

/// Extract the event type from a topic name
///
/// Returns the topic unchanged when it does not start with `{prefix}.` or
/// does not end with `.v{version}`.
pub fn event_type_from_topic(prefix: &str, topic: &str, version: u32) -> String {
    let head = format!("{}.", prefix);
    let tail = format!(".v{}", version);

    match topic
        .strip_prefix(head.as_str())
        .and_then(|rest| rest.strip_suffix(tail.as_str()))
    {
        Some(middle) if !middle.is_empty() => middle.replace('.', ""),
        _ => topic.to_string(),
    }
}

/// Read the version from the trailing `.v{N}` segment of a topic name
pub fn version_from_topic(topic: &str) -> Option<u32> {
    let (_, suffix) = topic.rsplit_once(".v")?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|v| *v > 0)
}
