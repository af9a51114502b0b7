//! # dbscope
//!
//! Observability interceptors for database client connections.
//!
//! This crate wraps every operation performed through a database component
//! with structured logging, metrics and distributed tracing, without
//! altering the operation's semantics. Interceptors compose into an ordered
//! decorator chain that is built once at bootstrap and applied uniformly to
//! every operation.
//!
//! ## Features
//!
//! - **Uniform instrumentation**: one chain of decorators around every
//!   operation, in a deterministic order
//! - **Built-in interceptors**: development-mode debug logging, Prometheus
//!   counters and latency histograms, client tracing spans
//! - **Extension point**: caller-supplied interceptors join the same chain
//! - **Bootstrap with failure policy**: parse the connection string, open
//!   and ping the connection, then either fail fast (`panic`) or serve a
//!   degraded component (`degrade`)
//! - **Process-wide registry**: look components up by logical name after
//!   bootstrap
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbscope::{Builder, Config, Scope};
//!
//! // Bootstrap a component against your driver implementation.
//! let component = Builder::new("orders")
//!     .with_config(Config::new("user:pass@tcp(127.0.0.1:3306)/orders"))
//!     .build(&driver)?;
//!
//! // Wire each operation once; the chain wraps the execution handler.
//! let query = component.wrap_operation("query", exec_handler);
//!
//! // Per call: thread a scope through the chain.
//! let mut scope = Scope::new("SELECT * FROM orders WHERE id = ?")
//!     .with_binds(vec![42.into()]);
//! query(&mut scope);
//! ```
//!
//! ## Configuration
//!
//! | Key | Effect |
//! |-----|--------|
//! | `dsn` | connection string (mysql-style DSN or URL form) |
//! | `debug` | enables the debug interceptor |
//! | `enable_trace_interceptor` | enables the trace interceptor (default on) |
//! | `enable_metric_interceptor` | enables the metric interceptor (default on) |
//! | `enable_access_interceptor` (+ `_req`, `_reply`) | normal-path info logs and payload inclusion |
//! | `enable_detail_sql` | interpolate bound values into rendered statements |
//! | `slow_log_threshold_ms` | slow-operation warning threshold; 0 disables |
//! | `on_failure` | `panic` \| `degrade` |
//!
//! ## Produced Telemetry
//!
//! | Series / attribute | Description |
//! |--------------------|-------------|
//! | `db_client_handle_total{type,name,addr,code}` | operations by outcome (`OK`, `Empty`, `Error`, `open-err`) |
//! | `db_client_handle_seconds{type,name,addr}` | operation latency distribution |
//! | `otel.name`, `otel.kind` | span label (`SELECT orders`) and kind (`client`) |
//! | `db.name`, `server.address`, `db.statement` | target database, address, rendered statement |
//! | `otel.status_code`, `error.message` | `OK`/`ERROR` plus error details |

mod bootstrap;
mod component;
mod config;
mod dsn;
mod error;
mod interceptor;
mod metrics;
mod parser;
mod registry;
mod scope;

/// Component kind attached to logs and spans.
pub const PACKAGE_NAME: &str = "dbscope";

pub use bootstrap::Builder;
pub use component::{Component, Connection, Driver};
pub use config::{Config, ConfigSource, OnFailure, DEFAULT_SLOW_LOG_THRESHOLD_MS};
pub use dsn::{Dsn, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
pub use error::{DriverError, Error, OperationError, Result};
pub use interceptor::{
    compose, DebugInterceptor, Handler, Identity, Interceptor, MetricInterceptor, TraceInterceptor,
};
pub use parser::{target_table, StatementInfo, StatementKind};
pub use registry::Registry;
pub use scope::Scope;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Builder, Component, Config, Connection, Driver, Handler, Interceptor, OnFailure, Registry,
        Scope,
    };
}
