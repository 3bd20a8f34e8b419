// Copyright (c) 2025 - Cowboy AI, Inc.
//! Vector Domain Events
//!
//! Embedding vectors are identified by a numeric id. The id travels as
//! `vectorId` and, stringified, as the aggregate id used for keying.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DomainEvent, EventHeader};

const VECTOR: &str = "vector";

/// What a vector embeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorType {
    Image,
    Text,
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorType::Image => f.write_str("image"),
            VectorType::Text => f.write_str("text"),
        }
    }
}

fn vector_header(vector_id: i64) -> EventHeader {
    EventHeader::new(VECTOR, vector_id.to_string())
}

fn check_vector_id(field: &str, vector_id: i64) -> Result<(), String> {
    if vector_id <= 0 {
        return Err(format!("'{}' must be positive, got {}", field, vector_id));
    }
    Ok(())
}

/// A new embedding vector was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorCreated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub vector_id: i64,
    pub vector_type: VectorType,
}

impl VectorCreated {
    pub fn create(vector_id: i64, vector_type: VectorType) -> Self {
        Self {
            header: vector_header(vector_id),
            vector_id,
            vector_type,
        }
    }
}

impl DomainEvent for VectorCreated {
    const EVENT_TYPE: &'static str = "vector.created";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_vector_id("vectorId", self.vector_id)
    }
}

/// A vector was moved towards a new embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorUpdated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub vector_id: i64,
    pub vector_type: VectorType,
    /// Similarity between the previous and the updated embedding
    pub similarity: f64,
}

impl VectorUpdated {
    pub fn create(vector_id: i64, vector_type: VectorType, similarity: f64) -> Self {
        Self {
            header: vector_header(vector_id),
            vector_id,
            vector_type,
            similarity,
        }
    }
}

impl DomainEvent for VectorUpdated {
    const EVENT_TYPE: &'static str = "vector.updated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_vector_id("vectorId", self.vector_id)?;
        if !self.similarity.is_finite() {
            return Err(format!("'similarity' must be finite, got {}", self.similarity));
        }
        Ok(())
    }
}

/// Several vectors were merged into one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorsMerged {
    #[serde(flatten)]
    pub header: EventHeader,
    pub vector_id: i64,
    pub vector_type: VectorType,
    pub source_vector_ids: Vec<i64>,
}

impl VectorsMerged {
    pub fn create(vector_id: i64, vector_type: VectorType, source_vector_ids: Vec<i64>) -> Self {
        Self {
            header: vector_header(vector_id),
            vector_id,
            vector_type,
            source_vector_ids,
        }
    }
}

impl DomainEvent for VectorsMerged {
    const EVENT_TYPE: &'static str = "vector.merged";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_vector_id("vectorId", self.vector_id)?;
        for source in &self.source_vector_ids {
            check_vector_id("sourceVectorIds", *source)?;
        }
        Ok(())
    }
}
