//! Application configuration loaded from environment variables.

use std::time::Duration;

use messaging::QueueSettings;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `SERVICE_NAME` — `source` stamped on published envelopes (default: `"order-service"`)
/// - `INBOUND_QUEUE_URL` — queue this service consumes (default: `"orders-inbound"`)
/// - `OUTBOUND_QUEUE_URL` — queue events are published to; empty disables publishing
/// - `BILLING_QUEUE_URL` — extra target for `ORDER_CREATED`; empty for none
/// - `DATABASE_URL` — PostgreSQL queue when set, in-memory queue otherwise.
///   Orders always live in process memory: with a shared queue, run a single
///   instance, or messages for orders created elsewhere fail as not found.
/// - `QUEUE_VISIBILITY_TIMEOUT_SECS` (default: `30`), `QUEUE_WAIT_TIME_SECS` (default: `20`),
///   `QUEUE_MAX_MESSAGES` (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub service_name: String,
    pub inbound_queue_url: String,
    pub outbound_queue_url: String,
    pub billing_queue_url: String,
    pub database_url: Option<String>,
    pub visibility_timeout_secs: u64,
    pub wait_time_secs: u64,
    pub max_messages: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            host: string("HOST", defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: string("RUST_LOG", defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            service_name: string("SERVICE_NAME", defaults.service_name),
            inbound_queue_url: string("INBOUND_QUEUE_URL", defaults.inbound_queue_url),
            outbound_queue_url: string("OUTBOUND_QUEUE_URL", defaults.outbound_queue_url),
            billing_queue_url: string("BILLING_QUEUE_URL", defaults.billing_queue_url),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            visibility_timeout_secs: parse_or(
                lookup("QUEUE_VISIBILITY_TIMEOUT_SECS"),
                defaults.visibility_timeout_secs,
            ),
            wait_time_secs: parse_or(lookup("QUEUE_WAIT_TIME_SECS"), defaults.wait_time_secs),
            max_messages: parse_or(lookup("QUEUE_MAX_MESSAGES"), defaults.max_messages),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Warning to log at start-up when the queue outlives the order store.
    pub fn order_store_warning(&self) -> Option<&'static str> {
        self.database_url.as_ref().map(|_| {
            "DATABASE_URL only backs the queue; orders are kept in process memory \
             and are lost on restart, run a single instance"
        })
    }

    /// Receive settings for the queue clients.
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_messages: self.max_messages.max(1),
            wait_time: Duration::from_secs(self.wait_time_secs),
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            ..QueueSettings::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            service_name: "order-service".to_string(),
            inbound_queue_url: "orders-inbound".to_string(),
            outbound_queue_url: String::new(),
            billing_queue_url: String::new(),
            database_url: None,
            visibility_timeout_secs: 30,
            wait_time_secs: 20,
            max_messages: 10,
        }
    }
}
