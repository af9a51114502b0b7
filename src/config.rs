//! Component configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default slow-operation threshold in milliseconds.
pub const DEFAULT_SLOW_LOG_THRESHOLD_MS: u64 = 500;

/// What [`Builder::build`](crate::Builder::build) does when the underlying
/// connection cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFailure {
    /// The build fails with [`Error::ConnectionOpenFailed`]. The caller
    /// decides whether that terminates the process.
    #[default]
    Panic,
    /// The build returns a non-functional component instead of failing.
    Degrade,
}

/// Configuration for a database component.
///
/// Immutable once the component is built. Values map one-to-one onto config
/// keys read through a [`ConfigSource`]; all fields have defaults, so a
/// config blob only needs to name the keys it overrides.
///
/// # Example
///
/// ```rust
/// use dbscope::{Config, OnFailure};
/// use std::time::Duration;
///
/// let config = Config::new("user:pass@tcp(127.0.0.1:3306)/orders")
///     .with_access_log(true)
///     .with_slow_log_threshold(Duration::from_millis(200))
///     .with_on_failure(OnFailure::Degrade);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection string, either mysql-style DSN or `scheme://` URL form.
    pub dsn: String,

    /// Development mode: enables the debug interceptor, which renders every
    /// statement with bound values interpolated.
    /// Default: `false`
    pub debug: bool,

    /// Whether to trace every operation with a client span.
    /// Default: `true`
    pub enable_trace_interceptor: bool,

    /// Whether to record counters and latency histograms per operation.
    /// Default: `true`
    pub enable_metric_interceptor: bool,

    /// Whether successful, non-slow operations emit an info-level access log.
    /// Default: `false`
    pub enable_access_interceptor: bool,

    /// Include the statement in access logs.
    /// Default: `false`
    pub enable_access_interceptor_req: bool,

    /// Include the result value in access logs.
    /// Default: `false` (results may contain sensitive data)
    pub enable_access_interceptor_reply: bool,

    /// Interpolate bound parameter values into rendered statements.
    /// Default: `false` (parameters may contain sensitive data)
    pub enable_detail_sql: bool,

    /// Operations slower than this are logged at WARN level with
    /// `event=slow`. Zero disables the slow log entirely.
    /// Default: 500ms
    pub slow_log_threshold_ms: u64,

    /// Failure policy applied when the connection cannot be opened.
    /// Default: `panic`
    pub on_failure: OnFailure,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            debug: false,
            enable_trace_interceptor: true,
            enable_metric_interceptor: true,
            enable_access_interceptor: false,
            enable_access_interceptor_req: false,
            enable_access_interceptor_reply: false,
            enable_detail_sql: false,
            slow_log_threshold_ms: DEFAULT_SLOW_LOG_THRESHOLD_MS,
            on_failure: OnFailure::Panic,
        }
    }
}

impl Config {
    /// Create a configuration for the given connection string with defaults.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Unmarshal the configuration stored under `key` in `source`.
    pub fn from_source(source: &dyn ConfigSource, key: &str) -> Result<Self> {
        let value = source.unmarshal_key(key).ok_or_else(|| Error::InvalidConfig {
            key: key.to_string(),
            message: "key not found".to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| Error::InvalidConfig {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Enable or disable development-mode debug logging.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Enable or disable the trace interceptor.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.enable_trace_interceptor = enabled;
        self
    }

    /// Enable or disable the metric interceptor.
    pub fn with_metric(mut self, enabled: bool) -> Self {
        self.enable_metric_interceptor = enabled;
        self
    }

    /// Enable or disable info-level access logging for the normal path.
    pub fn with_access_log(mut self, enabled: bool) -> Self {
        self.enable_access_interceptor = enabled;
        self
    }

    /// Include the statement in access logs.
    pub fn with_access_log_req(mut self, enabled: bool) -> Self {
        self.enable_access_interceptor_req = enabled;
        self
    }

    /// Include the result value in access logs.
    pub fn with_access_log_reply(mut self, enabled: bool) -> Self {
        self.enable_access_interceptor_reply = enabled;
        self
    }

    /// Interpolate bound values into rendered statements.
    ///
    /// **Security warning**: bound parameters often contain user input. Only
    /// enable in development or controlled environments.
    pub fn with_detail_sql(mut self, enabled: bool) -> Self {
        self.enable_detail_sql = enabled;
        self
    }

    /// Set the slow-operation threshold. `Duration::ZERO` disables it.
    pub fn with_slow_log_threshold(mut self, threshold: Duration) -> Self {
        self.slow_log_threshold_ms = threshold.as_millis() as u64;
        self
    }

    /// Set the failure policy for connection-open failures.
    pub fn with_on_failure(mut self, policy: OnFailure) -> Self {
        self.on_failure = policy;
        self
    }

    /// The slow-operation threshold as a `Duration`.
    pub fn slow_log_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_log_threshold_ms)
    }
}

/// Narrow view of an external configuration store.
///
/// The only capability this crate needs from its config collaborator is
/// fetching the raw settings blob stored under a key; deserialization
/// happens on this side via serde.
pub trait ConfigSource {
    /// The raw value stored under `key`, or `None` if absent. Keys may be
    /// dotted paths into nested objects (`"mysql.orders"`).
    fn unmarshal_key(&self, key: &str) -> Option<serde_json::Value>;
}

impl ConfigSource for serde_json::Value {
    fn unmarshal_key(&self, key: &str) -> Option<serde_json::Value> {
        let mut current = self;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }
}
