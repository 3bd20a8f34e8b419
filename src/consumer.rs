// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event consumer
//!
//! Receives envelopes from subscribed topics, turns them into typed events
//! through the [`EventFactory`] and fans each event out to the subscribers
//! registered for its topic.
//!
//! # Failure containment
//!
//! A message that cannot be turned into an event, or whose subscriber fails,
//! is logged and skipped. Subscribers run one after another in registration
//! order; the first failure ends processing of that message, so later
//! subscribers do not see it. The message still counts as consumed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use miraveja_events::consumer::{EventConsumer, FnSubscriber};
//! use miraveja_events::events::MemberRegistered;
//! use miraveja_events::Event;
//! # async fn example(mut consumer: EventConsumer) -> miraveja_events::EventBusResult<()> {
//! consumer.subscribe::<MemberRegistered>(Arc::new(FnSubscriber::new("welcome-mail", |event: &dyn Event| {
//!     let registered = event.downcast_ref::<MemberRegistered>();
//!     println!("welcome {:?}", registered.map(|e| &e.email));
//!     Ok(())
//! })));
//!
//! consumer.start(None).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerRecord, ConsumerClient, ConsumerConnector};
use crate::config::KafkaConfig;
use crate::errors::{EventBusError, EventBusResult};
use crate::events::{DomainEvent, Event};
use crate::factory::EventFactory;
use crate::kafka::KafkaConsumerConnector;
use crate::topics;

/// Receives events from the consumer
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one event
    async fn handle(&self, event: Arc<dyn Event>) -> EventBusResult<()>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Subscriber backed by a closure
pub struct FnSubscriber<F>
where
    F: Fn(&dyn Event) -> EventBusResult<()> + Send + Sync,
{
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&dyn Event) -> EventBusResult<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F> EventSubscriber for FnSubscriber<F>
where
    F: Fn(&dyn Event) -> EventBusResult<()> + Send + Sync,
{
    async fn handle(&self, event: Arc<dyn Event>) -> EventBusResult<()> {
        (self.handler)(event.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stops the consumer and releases the running flag on every exit path of
/// the receive loop
struct StopOnExit<'a>(&'a EventConsumer);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop();
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Topic subscriptions plus the receive loop
pub struct EventConsumer {
    connector: Arc<dyn ConsumerConnector>,
    factory: EventFactory,
    topic_prefix: String,
    auto_commit: bool,
    subscriptions: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
    subscriber_count: usize,
    client: Mutex<Option<Arc<dyn ConsumerClient>>>,
    running: AtomicBool,
}

impl EventConsumer {
    pub fn new(
        config: &KafkaConfig,
        factory: EventFactory,
        connector: Arc<dyn ConsumerConnector>,
    ) -> Self {
        Self {
            connector,
            factory,
            topic_prefix: config.topic_prefix.clone(),
            auto_commit: config.consumer.enable_auto_commit,
            subscriptions: HashMap::new(),
            subscriber_count: 0,
            client: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Consumer backed by a Kafka cluster
    pub fn kafka(config: &KafkaConfig, factory: EventFactory) -> Self {
        Self::new(
            config,
            factory,
            Arc::new(KafkaConsumerConnector::new(config.clone())),
        )
    }

    /// Subscribe to the topic of event kind `E`; returns the topic
    pub fn subscribe<E: DomainEvent>(&mut self, subscriber: Arc<dyn EventSubscriber>) -> String {
        self.subscribe_to(E::EVENT_TYPE, E::VERSION, subscriber)
    }

    /// Subscribe to the version 1 topic of a raw event type name
    pub fn subscribe_name(&mut self, event_type: &str, subscriber: Arc<dyn EventSubscriber>) -> String {
        self.subscribe_to(event_type, 1, subscriber)
    }

    /// Subscribe to the topic of `(event_type, version)`
    ///
    /// Appends to the topic's subscriber list; existing subscribers stay.
    pub fn subscribe_to(
        &mut self,
        event_type: &str,
        version: u32,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> String {
        let topic = topics::topic_name(&self.topic_prefix, event_type, version);

        info!(topic = %topic, subscriber = subscriber.name(), "Subscribed to topic");

        self.subscriptions
            .entry(topic.clone())
            .or_default()
            .push(subscriber);
        self.subscriber_count += 1;
        topic
    }

    /// Subscribers registered across all topics
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// Topics with at least one subscriber, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Connect and process messages until stopped or the broker fails
    ///
    /// With `None` every subscribed topic is consumed. The connection is
    /// stopped on every exit path, including cancellation of this future.
    /// Only one loop runs at a time; a call made while another is running
    /// fails with [`EventBusError::AlreadyRunning`] and leaves it untouched.
    pub async fn start(&self, topics: Option<Vec<String>>) -> EventBusResult<()> {
        let topics = topics.unwrap_or_else(|| self.topics());
        if topics.is_empty() {
            return Err(EventBusError::Configuration(
                "consumer has no topics to subscribe to".to_string(),
            ));
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(topics = ?topics, "Consumer start rejected; already running");
            return Err(EventBusError::AlreadyRunning);
        }
        let _stop = StopOnExit(self);

        let client = self.connector.connect(&topics).await?;
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());

        info!(
            topics = ?topics,
            subscribers = self.subscriber_count,
            auto_commit = self.auto_commit,
            "Consumer started"
        );

        while let Some(received) = client.recv().await {
            let record = match received {
                Ok(record) => record,
                Err(e) => {
                    error!(error = %e, "Consumer receive failed");
                    return Err(e);
                }
            };

            self.process_record(&record).await;

            if !self.auto_commit {
                if let Err(e) = client.commit(&record).await {
                    warn!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "Offset commit failed"
                    );
                }
            }
        }

        info!("Consumer receive loop ended");
        Ok(())
    }

    /// Stop the connection if one is open; repeat calls are no-ops
    pub fn stop(&self) {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(client) = client {
            client.stop();
            info!("Consumer stopped");
        }
    }

    /// Build the event for one record and hand it to the topic's subscribers
    ///
    /// Failures are logged and end processing of the record.
    pub async fn process_record(&self, record: &BrokerRecord) {
        let event = match self.factory.create_from_envelope(&record.value).await {
            Ok(event) => event,
            Err(e) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Failed to build event from message"
                );
                return;
            }
        };

        let Some(subscribers) = self.subscriptions.get(&record.topic) else {
            debug!(topic = %record.topic, event_type = event.event_type(), "No subscribers for topic");
            return;
        };

        for subscriber in subscribers {
            if let Err(e) = subscriber.handle(event.clone()).await {
                error!(
                    topic = %record.topic,
                    offset = record.offset,
                    event_id = %event.id(),
                    subscriber = subscriber.name(),
                    error = %e,
                    "Subscriber failed; skipping remaining subscribers"
                );
                return;
            }
        }

        debug!(
            topic = %record.topic,
            event_id = %event.id(),
            subscribers = subscribers.len(),
            "Event dispatched"
        );
    }
}
