//! Error types for bootstrap and per-operation failures.

use thiserror::Error;

/// Boxed error surfaced by a concrete driver when opening or probing a
/// connection.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the component bootstrap sequence.
///
/// Fatality is part of the contract: `MalformedAddress`, `InvalidConfig` and
/// `LivenessCheckFailed` always abort a build, while `ConnectionOpenFailed`
/// is only returned under the `panic` failure policy (the `degrade` policy
/// converts it into a non-functional component instead).
#[derive(Error, Debug)]
pub enum Error {
    /// The connection string could not be decomposed into address, database
    /// name and parameters.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// The underlying connection could not be opened.
    #[error("failed to open connection to {addr}: {cause}")]
    ConnectionOpenFailed { addr: String, cause: DriverError },

    /// The connection opened but failed its liveness probe.
    #[error("liveness check failed for {addr}: {cause}")]
    LivenessCheckFailed { addr: String, cause: DriverError },

    /// Configuration could not be unmarshalled from the config source.
    #[error("invalid configuration under key '{key}': {message}")]
    InvalidConfig { key: String, message: String },
}

/// Result alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-operation error observed by the interceptor chain.
///
/// Interceptors classify and report these but never swallow them: the value
/// stays on the scope and is surfaced to the caller unchanged.
#[derive(Error, Debug)]
pub enum OperationError {
    /// The operation completed but matched no rows. Logged at warning level
    /// and counted separately from real failures.
    #[error("record not found")]
    NotFound,

    /// Any other failure reported by the underlying driver.
    #[error("{0}")]
    Driver(String),
}

impl OperationError {
    /// Wrap a driver failure message.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Whether this is the distinguished not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
