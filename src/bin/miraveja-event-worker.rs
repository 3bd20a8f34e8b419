// Copyright (c) 2025 - Cowboy AI, Inc.
//! Miraveja Event Worker
//!
//! Consumes every built-in event kind from Kafka, validates each envelope
//! against its JSON Schema and logs the typed event.
//!
//! Run with: cargo run --bin miraveja-event-worker
//!
//! Prerequisites:
//! 1. Kafka reachable at `KAFKA_BOOTSTRAP_SERVERS` (default: localhost:9092)
//! 2. Schema files in `EVENT_SCHEMAS_PATH` (default: ./schemas), one
//!    `{topic}.json` per event kind

use anyhow::{Context, Result};
use async_trait::async_trait;
use miraveja_events::{
    register_builtin_events, Event, EventBusResult, EventConsumer, EventDeserializer,
    EventFactory, EventSubscriber, EventTypeRegistry, JsonFileSchemaRegistry, KafkaConfig,
    SchemaValidator,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Logs every received event
#[derive(Default)]
struct LoggingSubscriber {
    received: AtomicU64,
}

#[async_trait]
impl EventSubscriber for LoggingSubscriber {
    async fn handle(&self, event: Arc<dyn Event>) -> EventBusResult<()> {
        let total = self.received.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            event_type = event.event_type(),
            version = event.version(),
            event_id = %event.id(),
            aggregate_type = event.aggregate_type(),
            aggregate_id = event.aggregate_id(),
            total = total,
            "📨 Received event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "event-logger"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting Miraveja Event Worker");

    let config = KafkaConfig::from_env().context("Failed to load Kafka configuration")?;
    config
        .validate_consumer()
        .context("Invalid Kafka consumer configuration")?;
    info!("📋 Configuration loaded:");
    info!("  - Brokers: {}", config.brokers_string());
    info!("  - Topic prefix: {}", config.topic_prefix);
    info!("  - Consumer group: {}", config.consumer.group_id);
    info!("  - Schemas: {}", config.event_schemas_path);

    let mut registry = EventTypeRegistry::new();
    register_builtin_events(&mut registry).context("Failed to register event kinds")?;
    let kinds: Vec<(String, u32)> = registry
        .descriptors()
        .into_iter()
        .map(|d| (d.event_type.clone(), d.version))
        .collect();
    info!("✅ Registered {} event kinds", kinds.len());

    let factory = EventFactory::new(
        SchemaValidator::new(Arc::new(JsonFileSchemaRegistry::from_config(&config))),
        EventDeserializer::new(Arc::new(registry)),
    );

    let mut consumer = EventConsumer::kafka(&config, factory);
    let logger: Arc<dyn EventSubscriber> = Arc::new(LoggingSubscriber::default());
    for (event_type, version) in &kinds {
        consumer.subscribe_to(event_type, *version, logger.clone());
    }
    let consumer = Arc::new(consumer);

    info!("🎧 Starting event consumption...");
    let mut worker = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.start(None).await }
    });

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("🛑 Shutdown requested");
            consumer.stop();
            worker.await
        }
        outcome = &mut worker => outcome,
    };
    outcome
        .context("Consumer task panicked")?
        .context("Consumer failed")?;

    info!("👋 Miraveja Event Worker stopped");
    Ok(())
}
