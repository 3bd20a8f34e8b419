// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed domain-event bus over Kafka for the Miraveja gallery backend
//!
//! Domain events are published as versioned JSON envelopes, one topic per
//! event kind, keyed by aggregate id. Consumers validate each envelope against
//! a JSON Schema, rebuild the typed event through the [`EventTypeRegistry`]
//! and hand it to the subscribers of its topic.
//!
//! # Architecture
//!
//! ```text
//! EventDispatcher → EventProducer → ProducerClient ─┐
//!                                                   │  {prefix}.{type}.v{n}
//! EventSubscriber ← EventConsumer ← ConsumerClient ←┘
//!                        │
//!                   EventFactory
//!                   ├─ SchemaValidator  → SchemaRegistry
//!                   └─ EventDeserializer → EventTypeRegistry
//! ```
//!
//! The broker is reached through the traits in [`broker`]: [`kafka`] talks
//! to a real cluster, [`memory`] keeps everything in process.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod deserializer;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod factory;
pub mod kafka;
pub mod memory;
pub mod producer;
pub mod registry;
pub mod schema_registry;
pub mod topics;
pub mod validator;

// Re-export commonly used types
pub use broker::{BrokerRecord, ConsumerClient, ConsumerConnector, DeliveryReport, ProducerClient, ProducerConnector};
pub use config::{ConsumerConfig, KafkaConfig, ProducerConfig};
pub use consumer::{EventConsumer, EventSubscriber, FnSubscriber};
pub use deserializer::EventDeserializer;
pub use dispatcher::EventDispatcher;
pub use errors::{EventBusError, EventBusResult};
pub use events::{register_builtin_events, DomainEvent, Envelope, Event, EventHeader};
pub use factory::EventFactory;
pub use memory::InMemoryBroker;
pub use producer::{BatchReport, EventProducer, PublishFailure, PublishedEvent};
pub use registry::{EventDescriptor, EventTypeRegistry};
pub use schema_registry::{InMemorySchemaRegistry, JsonFileSchemaRegistry, SchemaRegistry};
pub use validator::SchemaValidator;
