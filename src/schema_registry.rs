// Copyright (c) 2025 - Cowboy AI, Inc.
//! JSON Schema sources
//!
//! The validator fetches the schema for each `(type, version)` from a
//! [`SchemaRegistry`]. Two implementations are provided:
//!
//! - [`JsonFileSchemaRegistry`] reads `{dir}/{topic}.json` files and caches them
//! - [`InMemorySchemaRegistry`] keeps schemas in a map

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::errors::{EventBusError, EventBusResult};
use crate::topics;

/// Source of JSON Schemas for event payloads
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Schema for the payload of `(event_type, version)`
    async fn get_schema(&self, event_type: &str, version: u32) -> EventBusResult<Value>;

    /// Store or replace the schema for `(event_type, version)`
    async fn register_schema(
        &self,
        event_type: &str,
        version: u32,
        schema: Value,
    ) -> EventBusResult<()>;
}

/// Schemas stored as JSON files named after their topic
#[derive(Debug)]
pub struct JsonFileSchemaRegistry {
    directory: PathBuf,
    topic_prefix: String,
    cache: RwLock<HashMap<(String, u32), Value>>,
}

impl JsonFileSchemaRegistry {
    pub fn new(directory: impl Into<PathBuf>, topic_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            topic_prefix: topic_prefix.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Use the configured schema directory and topic prefix
    pub fn from_config(config: &KafkaConfig) -> Self {
        Self::new(&config.event_schemas_path, &config.topic_prefix)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that holds the schema for `(event_type, version)`
    pub fn schema_path(&self, event_type: &str, version: u32) -> PathBuf {
        let topic = topics::topic_name(&self.topic_prefix, event_type, version);
        self.directory.join(format!("{}.json", topic))
    }

    async fn load(&self, event_type: &str, version: u32) -> EventBusResult<Value> {
        if !tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            return Err(EventBusError::SchemasDirectoryNotFound(
                self.directory.display().to_string(),
            ));
        }

        let path = self.schema_path(event_type, version);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EventBusError::SchemaFileNotFound(path.display().to_string()))
            }
            Err(e) => {
                return Err(EventBusError::InvalidSchemaJson {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        let schema = serde_json::from_str(&contents).map_err(|e| EventBusError::InvalidSchemaJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), "Loaded event schema");
        Ok(schema)
    }
}

#[async_trait]
impl SchemaRegistry for JsonFileSchemaRegistry {
    async fn get_schema(&self, event_type: &str, version: u32) -> EventBusResult<Value> {
        let key = (event_type.to_string(), version);
        if let Some(schema) = self.cache.read().await.get(&key) {
            return Ok(schema.clone());
        }

        let schema = self.load(event_type, version).await?;
        self.cache.write().await.insert(key, schema.clone());
        Ok(schema)
    }

    async fn register_schema(
        &self,
        event_type: &str,
        version: u32,
        schema: Value,
    ) -> EventBusResult<()> {
        let path = self.schema_path(event_type, version);
        let write_error = |e: std::io::Error| EventBusError::InvalidSchemaJson {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(write_error)?;
        let contents = serde_json::to_string_pretty(&schema)?;
        tokio::fs::write(&path, contents).await.map_err(write_error)?;

        self.cache.write().await.clear();

        info!(
            event_type = %event_type,
            version = version,
            path = %path.display(),
            "Registered event schema"
        );
        Ok(())
    }
}

/// Schemas held in memory
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    schemas: RwLock<HashMap<(String, u32), Value>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration for wiring and tests
    pub fn with_schema(mut self, event_type: &str, version: u32, schema: Value) -> Self {
        self.schemas
            .get_mut()
            .insert((event_type.to_string(), version), schema);
        self
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn get_schema(&self, event_type: &str, version: u32) -> EventBusResult<Value> {
        self.schemas
            .read()
            .await
            .get(&(event_type.to_string(), version))
            .cloned()
            .ok_or_else(|| {
                EventBusError::SchemaFileNotFound(format!("{} v{}", event_type, version))
            })
    }

    async fn register_schema(
        &self,
        event_type: &str,
        version: u32,
        schema: Value,
    ) -> EventBusResult<()> {
        self.schemas
            .write()
            .await
            .insert((event_type.to_string(), version), schema);
        Ok(())
    }
}
