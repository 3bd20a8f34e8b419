// Copyright (c) 2025 - Cowboy AI, Inc.
//! Kafka configuration for the event bus
//!
//! Configuration can be built in code (every struct has a `Default`), read
//! from `KAFKA_*` environment variables, or loaded from a camelCase JSON file.
//! Only variables that are present override the defaults.
//!
//! | Variable | Field |
//! |---|---|
//! | `KAFKA_BOOTSTRAP_SERVERS` | comma-separated broker list |
//! | `KAFKA_TOPIC_PREFIX` | topic prefix |
//! | `KAFKA_SECURITY_PROTOCOL` | `PLAINTEXT`, `SSL`, `SASL_PLAINTEXT`, `SASL_SSL` |
//! | `KAFKA_ENABLE_IDEMPOTENCE` | `true`/`1`/`yes` |
//! | `KAFKA_COMPRESSION_TYPE` | `none`, `gzip`, `snappy`, `lz4`, `zstd` |
//! | `KAFKA_BATCH_SIZE`, `KAFKA_LINGER_MILLIS`, `KAFKA_BUFFER_MEMORY` | batching |
//! | `KAFKA_PRODUCER_*` | acks, retries, backoff, in-flight, timeout |
//! | `KAFKA_CONSUMER_*` | group id, offset reset, auto-commit, timeouts |
//! | `KAFKA_SASL_*`, `KAFKA_SSL_*` | credentials and certificates |
//! | `EVENT_SCHEMAS_PATH` | directory of JSON Schema files |

use rdkafka::config::ClientConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{EventBusError, EventBusResult};
use crate::topics;

const MILLIS_1_SEC: u64 = 1_000;
const MILLIS_3_SEC: u64 = 3_000;
const MILLIS_5_SEC: u64 = 5_000;
const MILLIS_10_SEC: u64 = 10_000;
const SIZE_16_MB: u64 = 16 * 1024 * 1024;
const SIZE_32_MB: u64 = 32 * 1024 * 1024;

/// Maximum in-flight requests librdkafka allows with idempotence enabled
const MAX_IDEMPOTENT_IN_FLIGHT: u32 = 5;

macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Wire representation of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EventBusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case($wire) {
                    return Ok($name::$variant);
                })+
                Err(EventBusError::Configuration(format!(
                    "invalid {} value: '{}'",
                    stringify!($name),
                    s
                )))
            }
        }
    };
}

config_enum! {
    /// Acknowledgment level required from the broker
    ProducerAcks {
        /// All in-sync replicas
        All => "all",
        /// Partition leader only
        Leader => "1",
        /// Fire and forget
        None => "0",
    }
}

config_enum! {
    /// Where a consumer group without a committed offset starts reading
    OffsetReset {
        Earliest => "earliest",
        Latest => "latest",
        /// Fail instead of resetting
        None => "none",
    }
}

config_enum! {
    /// Transport security between clients and brokers
    SecurityProtocol {
        Plaintext => "PLAINTEXT",
        Ssl => "SSL",
        SaslPlaintext => "SASL_PLAINTEXT",
        SaslSsl => "SASL_SSL",
    }
}

config_enum! {
    /// SASL authentication mechanism
    SaslMechanism {
        Plain => "PLAIN",
        ScramSha256 => "SCRAM-SHA-256",
        ScramSha512 => "SCRAM-SHA-512",
    }
}

config_enum! {
    /// Compression codec for produced batches
    CompressionType {
        None => "none",
        Gzip => "gzip",
        Snappy => "snappy",
        Lz4 => "lz4",
        Zstd => "zstd",
    }
}

impl SecurityProtocol {
    /// Whether the protocol authenticates with SASL
    pub fn uses_sasl(&self) -> bool {
        matches!(self, SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl)
    }

    /// Whether the protocol encrypts with TLS
    pub fn uses_tls(&self) -> bool {
        matches!(self, SecurityProtocol::Ssl | SecurityProtocol::SaslSsl)
    }
}

/// Producer reliability settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProducerConfig {
    /// Acknowledgment level
    pub acks: ProducerAcks,
    /// Retries for failed sends
    pub retries: u32,
    /// Backoff between retries in milliseconds
    pub retry_backoff_millis: u64,
    /// Maximum in-flight requests per connection
    pub max_in_flight_requests: u32,
    /// Request timeout in milliseconds, also used as the flush timeout on close
    pub timeout_millis: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            acks: ProducerAcks::All,
            retries: 3,
            retry_backoff_millis: MILLIS_1_SEC,
            max_in_flight_requests: 1,
            timeout_millis: MILLIS_10_SEC,
        }
    }
}

impl ProducerConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    fn apply_env<F>(&mut self, lookup: &F) -> EventBusResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(acks) = lookup("KAFKA_PRODUCER_ACKS") {
            self.acks = acks.parse()?;
        }
        if let Some(retries) = lookup("KAFKA_PRODUCER_RETRIES") {
            self.retries = parse_number("KAFKA_PRODUCER_RETRIES", &retries)?;
        }
        if let Some(backoff) = lookup("KAFKA_PRODUCER_RETRY_BACKOFF_MILLIS") {
            self.retry_backoff_millis = parse_number("KAFKA_PRODUCER_RETRY_BACKOFF_MILLIS", &backoff)?;
        }
        if let Some(in_flight) = lookup("KAFKA_PRODUCER_MAX_IN_FLIGHT_REQUESTS") {
            self.max_in_flight_requests =
                parse_number("KAFKA_PRODUCER_MAX_IN_FLIGHT_REQUESTS", &in_flight)?;
        }
        if let Some(timeout) = lookup("KAFKA_PRODUCER_TIMEOUT_MILLIS") {
            self.timeout_millis = parse_number("KAFKA_PRODUCER_TIMEOUT_MILLIS", &timeout)?;
        }
        Ok(())
    }
}

/// Consumer group settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumerConfig {
    /// Consumer group id
    pub group_id: String,
    /// Offset reset policy
    pub auto_offset_reset: OffsetReset,
    /// Whether offsets are committed automatically
    pub enable_auto_commit: bool,
    /// Auto-commit interval in milliseconds
    pub auto_commit_interval_millis: u64,
    /// Group session timeout in milliseconds
    pub session_timeout_millis: u64,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_millis: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "miraveja-group".to_string(),
            auto_offset_reset: OffsetReset::Earliest,
            enable_auto_commit: true,
            auto_commit_interval_millis: MILLIS_5_SEC,
            session_timeout_millis: MILLIS_10_SEC,
            heartbeat_interval_millis: MILLIS_3_SEC,
        }
    }
}

impl ConsumerConfig {
    fn apply_env<F>(&mut self, lookup: &F) -> EventBusResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(group_id) = lookup("KAFKA_CONSUMER_GROUP_ID") {
            self.group_id = group_id;
        }
        if let Some(reset) = lookup("KAFKA_CONSUMER_AUTO_OFFSET_RESET") {
            self.auto_offset_reset = reset.parse()?;
        }
        if let Some(auto_commit) = lookup("KAFKA_CONSUMER_ENABLE_AUTO_COMMIT") {
            self.enable_auto_commit = parse_flag(&auto_commit);
        }
        if let Some(interval) = lookup("KAFKA_CONSUMER_AUTO_COMMIT_INTERVAL_MILLIS") {
            self.auto_commit_interval_millis =
                parse_number("KAFKA_CONSUMER_AUTO_COMMIT_INTERVAL_MILLIS", &interval)?;
        }
        if let Some(timeout) = lookup("KAFKA_CONSUMER_SESSION_TIMEOUT_MILLIS") {
            self.session_timeout_millis =
                parse_number("KAFKA_CONSUMER_SESSION_TIMEOUT_MILLIS", &timeout)?;
        }
        if let Some(heartbeat) = lookup("KAFKA_CONSUMER_HEARTBEAT_INTERVAL_MILLIS") {
            self.heartbeat_interval_millis =
                parse_number("KAFKA_CONSUMER_HEARTBEAT_INTERVAL_MILLIS", &heartbeat)?;
        }
        Ok(())
    }
}

/// SASL credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaslConfig {
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

impl Default for SaslConfig {
    fn default() -> Self {
        Self {
            mechanism: SaslMechanism::Plain,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl SaslConfig {
    fn from_lookup<F>(lookup: &F) -> EventBusResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(mechanism) = lookup("KAFKA_SASL_MECHANISM") {
            config.mechanism = mechanism.parse()?;
        }
        if let Some(username) = lookup("KAFKA_SASL_USERNAME") {
            config.username = username;
        }
        if let Some(password) = lookup("KAFKA_SASL_PASSWORD") {
            config.password = password;
        }
        Ok(config)
    }
}

/// TLS certificate locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SslConfig {
    /// CA certificate file
    pub cafile: String,
    /// Client certificate file
    pub certfile: String,
    /// Client key file
    pub keyfile: String,
    /// Password for an encrypted client key
    pub password: Option<String>,
}

impl SslConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            cafile: lookup("KAFKA_SSL_CAFILE").unwrap_or_default(),
            certfile: lookup("KAFKA_SSL_CERTFILE").unwrap_or_default(),
            keyfile: lookup("KAFKA_SSL_KEYFILE").unwrap_or_default(),
            password: lookup("KAFKA_SSL_PASSWORD"),
        }
    }
}

/// Top-level configuration shared by the producer and the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KafkaConfig {
    /// Broker addresses (`host:port`)
    #[serde(deserialize_with = "deserialize_servers")]
    pub bootstrap_servers: Vec<String>,
    /// Prefix for every topic name
    pub topic_prefix: String,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    pub security_protocol: SecurityProtocol,
    pub sasl: Option<SaslConfig>,
    pub ssl: Option<SslConfig>,
    /// Idempotent producer
    pub enable_idempotence: bool,
    pub compression_type: CompressionType,
    /// Batch size in bytes
    pub batch_size: u64,
    /// Linger time in milliseconds
    pub linger_millis: u64,
    /// Producer buffer memory in bytes
    pub buffer_memory: u64,
    /// Directory holding `{topic}.json` schema files
    pub event_schemas_path: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            topic_prefix: "miraveja".to_string(),
            producer: ProducerConfig::default(),
            consumer: ConsumerConfig::default(),
            security_protocol: SecurityProtocol::Plaintext,
            sasl: None,
            ssl: None,
            enable_idempotence: true,
            compression_type: CompressionType::Gzip,
            batch_size: SIZE_16_MB,
            linger_millis: 5,
            buffer_memory: SIZE_32_MB,
            event_schemas_path: "schemas".to_string(),
        }
    }
}

impl KafkaConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> EventBusResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> EventBusResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(servers) = lookup("KAFKA_BOOTSTRAP_SERVERS") {
            config.bootstrap_servers = split_servers(&servers);
        }
        if let Some(prefix) = lookup("KAFKA_TOPIC_PREFIX") {
            config.topic_prefix = prefix;
        }
        if let Some(protocol) = lookup("KAFKA_SECURITY_PROTOCOL") {
            config.security_protocol = protocol.parse()?;
        }
        if let Some(idempotence) = lookup("KAFKA_ENABLE_IDEMPOTENCE") {
            config.enable_idempotence = parse_flag(&idempotence);
        }
        if let Some(compression) = lookup("KAFKA_COMPRESSION_TYPE") {
            config.compression_type = compression.parse()?;
        }
        if let Some(batch_size) = lookup("KAFKA_BATCH_SIZE") {
            config.batch_size = parse_number("KAFKA_BATCH_SIZE", &batch_size)?;
        }
        if let Some(linger) = lookup("KAFKA_LINGER_MILLIS") {
            config.linger_millis = parse_number("KAFKA_LINGER_MILLIS", &linger)?;
        }
        if let Some(buffer) = lookup("KAFKA_BUFFER_MEMORY") {
            config.buffer_memory = parse_number("KAFKA_BUFFER_MEMORY", &buffer)?;
        }
        if let Some(path) = lookup("EVENT_SCHEMAS_PATH") {
            config.event_schemas_path = path;
        }

        config.producer.apply_env(&lookup)?;
        config.consumer.apply_env(&lookup)?;

        if lookup("KAFKA_SASL_MECHANISM").is_some_and(|v| !v.is_empty()) {
            config.sasl = Some(SaslConfig::from_lookup(&lookup)?);
        }
        if lookup("KAFKA_SSL_CAFILE").is_some_and(|v| !v.is_empty()) {
            config.ssl = Some(SslConfig::from_lookup(&lookup));
        }

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> EventBusResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EventBusError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            EventBusError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Check producer and consumer settings
    pub fn validate(&self) -> EventBusResult<()> {
        self.validate_producer()?;
        self.validate_consumer()
    }

    /// Settings a producer connection needs
    pub fn validate_producer(&self) -> EventBusResult<()> {
        self.validate_connection()?;
        if self.enable_idempotence {
            if self.producer.acks != ProducerAcks::All {
                return Err(EventBusError::Configuration(
                    "idempotent producer requires acks=all".to_string(),
                ));
            }
            if self.producer.max_in_flight_requests > MAX_IDEMPOTENT_IN_FLIGHT {
                return Err(EventBusError::Configuration(format!(
                    "idempotent producer allows at most {} in-flight requests",
                    MAX_IDEMPOTENT_IN_FLIGHT
                )));
            }
        }
        Ok(())
    }

    /// Settings a consumer connection needs
    pub fn validate_consumer(&self) -> EventBusResult<()> {
        self.validate_connection()?;
        if self.consumer.group_id.trim().is_empty() {
            return Err(EventBusError::Configuration(
                "consumer group id is required".to_string(),
            ));
        }
        if self.consumer.heartbeat_interval_millis >= self.consumer.session_timeout_millis {
            return Err(EventBusError::Configuration(format!(
                "heartbeat interval ({} ms) must be lower than the session timeout ({} ms)",
                self.consumer.heartbeat_interval_millis, self.consumer.session_timeout_millis
            )));
        }
        Ok(())
    }

    /// Broker list and security settings shared by both connection kinds
    fn validate_connection(&self) -> EventBusResult<()> {
        if self.bootstrap_servers.iter().all(|s| s.trim().is_empty()) {
            return Err(EventBusError::Configuration(
                "at least one bootstrap server is required".to_string(),
            ));
        }
        if self.security_protocol.uses_sasl() && self.sasl.is_none() {
            return Err(EventBusError::Configuration(format!(
                "security protocol {} requires SASL settings",
                self.security_protocol
            )));
        }
        if self.security_protocol.uses_tls() && self.ssl.is_none() {
            return Err(EventBusError::Configuration(format!(
                "security protocol {} requires SSL settings",
                self.security_protocol
            )));
        }
        Ok(())
    }

    /// Broker list joined for librdkafka
    pub fn brokers_string(&self) -> String {
        self.bootstrap_servers.join(",")
    }

    /// Topic for an event kind under this prefix
    pub fn topic_name(&self, event_type: &str, version: u32) -> String {
        topics::topic_name(&self.topic_prefix, event_type, version)
    }

    /// Lossy inverse of [`KafkaConfig::topic_name`]
    pub fn event_type_from_topic(&self, topic: &str, version: u32) -> String {
        topics::event_type_from_topic(&self.topic_prefix, topic, version)
    }

    /// librdkafka settings for the producer
    pub fn producer_client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.brokers_string())
            .set("acks", self.producer.acks.as_str())
            .set("retries", self.producer.retries.to_string())
            .set("retry.backoff.ms", self.producer.retry_backoff_millis.to_string())
            .set(
                "max.in.flight.requests.per.connection",
                self.producer.max_in_flight_requests.to_string(),
            )
            .set("request.timeout.ms", self.producer.timeout_millis.to_string())
            .set("enable.idempotence", self.enable_idempotence.to_string())
            .set("compression.type", self.compression_type.as_str())
            .set("batch.size", self.batch_size.to_string())
            .set("linger.ms", self.linger_millis.to_string())
            .set(
                "queue.buffering.max.kbytes",
                (self.buffer_memory / 1024).max(1).to_string(),
            );
        self.apply_security(&mut client_config);
        client_config
    }

    /// librdkafka settings for the consumer
    pub fn consumer_client_config(&self) -> ClientConfig {
        let reset = match self.consumer.auto_offset_reset {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
            OffsetReset::None => "error",
        };

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.brokers_string())
            .set("group.id", &self.consumer.group_id)
            .set("auto.offset.reset", reset)
            .set("enable.auto.commit", self.consumer.enable_auto_commit.to_string())
            .set(
                "auto.commit.interval.ms",
                self.consumer.auto_commit_interval_millis.to_string(),
            )
            .set(
                "session.timeout.ms",
                self.consumer.session_timeout_millis.to_string(),
            )
            .set(
                "heartbeat.interval.ms",
                self.consumer.heartbeat_interval_millis.to_string(),
            );
        self.apply_security(&mut client_config);
        client_config
    }

    fn apply_security(&self, client_config: &mut ClientConfig) {
        client_config.set(
            "security.protocol",
            self.security_protocol.as_str().to_lowercase(),
        );

        if let Some(sasl) = self.sasl.as_ref().filter(|_| self.security_protocol.uses_sasl()) {
            client_config
                .set("sasl.mechanism", sasl.mechanism.as_str())
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        if let Some(ssl) = self.ssl.as_ref().filter(|_| self.security_protocol.uses_tls()) {
            set_if_present(client_config, "ssl.ca.location", &ssl.cafile);
            set_if_present(client_config, "ssl.certificate.location", &ssl.certfile);
            set_if_present(client_config, "ssl.key.location", &ssl.keyfile);
            if let Some(password) = &ssl.password {
                set_if_present(client_config, "ssl.key.password", password);
            }
        }
    }
}

fn set_if_present(client_config: &mut ClientConfig, key: &str, value: &str) {
    if !value.is_empty() {
        client_config.set(key, value);
    }
}

fn split_servers(servers: &str) -> Vec<String> {
    servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> EventBusResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EventBusError::Configuration(format!("{} must be a number, got '{}'", name, value)))
}

/// Accepts either `"a:9092,b:9092"` or `["a:9092", "b:9092"]`
fn deserialize_servers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Servers {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Servers::deserialize(deserializer)? {
        Servers::Joined(joined) => split_servers(&joined),
        Servers::List(list) => list,
    })
}
