// Copyright (c) 2025 - Cowboy AI, Inc.
//! Failure notification event
//!
//! `event.exception.occurred` is produced by the factory when a failure should
//! be broadcast as a regular event. It is not tied to a domain aggregate: the
//! aggregate type is `"event"` and the aggregate id is empty.

use serde::{Deserialize, Serialize};

use super::{DomainEvent, EventHeader};

/// An error was captured and turned into an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionOccurred {
    #[serde(flatten)]
    pub header: EventHeader,
    pub exception_message: String,
    pub exception_code: i64,
}

impl ExceptionOccurred {
    pub fn create(exception_message: impl Into<String>, exception_code: i64) -> Self {
        Self {
            header: EventHeader::new("event", ""),
            exception_message: exception_message.into(),
            exception_code,
        }
    }
}

impl DomainEvent for ExceptionOccurred {
    const EVENT_TYPE: &'static str = "event.exception.occurred";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }
}
