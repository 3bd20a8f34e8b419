// Copyright (c) 2025 - Cowboy AI, Inc.
//! Gallery Domain Events
//!
//! ImageMetadata aggregates are identified by a numeric id. The id travels as
//! `imageMetadataId` and, stringified, as the aggregate id used for keying.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DomainEvent, EventHeader};

const IMAGE_METADATA: &str = "ImageMetadata";

fn image_header(image_metadata_id: i64) -> EventHeader {
    EventHeader::new(IMAGE_METADATA, image_metadata_id.to_string())
}

fn check_image_id(image_metadata_id: i64) -> Result<(), String> {
    if image_metadata_id <= 0 {
        return Err(format!(
            "'imageMetadataId' must be positive, got {}",
            image_metadata_id
        ));
    }
    Ok(())
}

/// Image metadata was stored for a newly uploaded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadataRegistered {
    #[serde(flatten)]
    pub header: EventHeader,
    pub image_metadata_id: i64,
    pub data: Map<String, Value>,
}

impl ImageMetadataRegistered {
    pub fn create(image_metadata_id: i64, data: Map<String, Value>) -> Self {
        Self {
            header: image_header(image_metadata_id),
            image_metadata_id,
            data,
        }
    }
}

impl DomainEvent for ImageMetadataRegistered {
    const EVENT_TYPE: &'static str = "image.metadata.registered";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_image_id(self.image_metadata_id)
    }
}

/// Image metadata changed; both snapshots are carried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadataUpdated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub image_metadata_id: i64,
    pub old_data: Map<String, Value>,
    pub new_data: Map<String, Value>,
}

impl ImageMetadataUpdated {
    pub fn create(
        image_metadata_id: i64,
        old_data: Map<String, Value>,
        new_data: Map<String, Value>,
    ) -> Self {
        Self {
            header: image_header(image_metadata_id),
            image_metadata_id,
            old_data,
            new_data,
        }
    }

    /// Keys whose value differs between the two snapshots
    pub fn changed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .old_data
            .keys()
            .chain(self.new_data.keys())
            .map(String::as_str)
            .filter(|key| self.old_data.get(*key) != self.new_data.get(*key))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

impl DomainEvent for ImageMetadataUpdated {
    const EVENT_TYPE: &'static str = "image.metadata.updated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_image_id(self.image_metadata_id)
    }
}

/// Embedding vector was stored for the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVectorIdAssigned {
    #[serde(flatten)]
    pub header: EventHeader,
    pub image_metadata_id: i64,
    pub vector_id: String,
}

impl ImageVectorIdAssigned {
    pub fn create(image_metadata_id: i64, vector_id: impl Into<String>) -> Self {
        Self {
            header: image_header(image_metadata_id),
            image_metadata_id,
            vector_id: vector_id.into(),
        }
    }
}

impl DomainEvent for ImageVectorIdAssigned {
    const EVENT_TYPE: &'static str = "image.metadata.vector_id.assigned";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_image_id(self.image_metadata_id)
    }
}

/// Embedding vector was detached from the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVectorIdUnassigned {
    #[serde(flatten)]
    pub header: EventHeader,
    pub image_metadata_id: i64,
    pub vector_id: String,
}

impl ImageVectorIdUnassigned {
    pub fn create(image_metadata_id: i64, vector_id: impl Into<String>) -> Self {
        Self {
            header: image_header(image_metadata_id),
            image_metadata_id,
            vector_id: vector_id.into(),
        }
    }
}

impl DomainEvent for ImageVectorIdUnassigned {
    const EVENT_TYPE: &'static str = "image.metadata.vector_id.unassigned";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_image_id(self.image_metadata_id)
    }
}

/// Thumbnail was generated and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageThumbnailSet {
    #[serde(flatten)]
    pub header: EventHeader,
    pub image_metadata_id: i64,
    pub thumbnail_uri: String,
}

impl ImageThumbnailSet {
    pub fn create(image_metadata_id: i64, thumbnail_uri: impl Into<String>) -> Self {
        Self {
            header: image_header(image_metadata_id),
            image_metadata_id,
            thumbnail_uri: thumbnail_uri.into(),
        }
    }
}

impl DomainEvent for ImageThumbnailSet {
    const EVENT_TYPE: &'static str = "image.thumbnail.set";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_image_id(self.image_metadata_id)?;
        if self.thumbnail_uri.trim().is_empty() {
            return Err("'thumbnailUri' must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numeric_id_becomes_aggregate_key() {
        let event = ImageThumbnailSet::create(77, "s3://thumbs/77.webp");
        assert_eq!(event.header.aggregate_id, "77");
        assert_eq!(event.header.aggregate_type, "ImageMetadata");
    }

    #[test]
    fn test_changed_keys() {
        let event = ImageMetadataUpdated::create(
            5,
            map(json!({"title": "a", "width": 10, "tag": "x"})),
            map(json!({"title": "b", "width": 10, "nsfw": false})),
        );

        assert_eq!(event.changed_keys(), vec!["nsfw", "tag", "title"]);
    }

    #[test]
    fn test_non_positive_id_fails_check() {
        assert!(ImageVectorIdAssigned::create(0, "v-1").check().is_err());
        assert!(ImageVectorIdAssigned::create(3, "v-1").check().is_ok());
    }

    #[test]
    fn test_wire_payload_with_numeric_aggregate_id() {
        let event: ImageMetadataRegistered = serde_json::from_value(json!({
            "aggregateType": "ImageMetadata",
            "aggregateId": 12,
            "imageMetadataId": 12,
            "data": {"title": "sunset"}
        }))
        .unwrap();

        assert_eq!(event.header.aggregate_id, "12");
        assert_eq!(event.data["title"], "sunset");
    }
}
