//! The interceptor pipeline.
//!
//! A [`Handler`] processes one operation [`Scope`]; an [`Interceptor`] wraps
//! a handler with added behavior. The chain is composed once when a
//! component is built and never reordered afterwards, so observability
//! layers see timing and error state exactly as the operation produced them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::field;

use crate::config::Config;
use crate::dsn::Dsn;
use crate::error::OperationError;
use crate::metrics;
use crate::parser::StatementInfo;
use crate::scope::Scope;

/// Processes one operation scope. The innermost handler performs the actual
/// database work; every other layer decorates it.
pub type Handler = Arc<dyn Fn(&mut Scope) + Send + Sync>;

/// Static identity handed to interceptors when the chain is built.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Component kind, e.g. [`crate::PACKAGE_NAME`].
    pub component: &'static str,
    /// Logical component name.
    pub name: String,
    /// Parsed connection address.
    pub dsn: Arc<Dsn>,
    /// Operation name the chain was built for, e.g. `query`.
    pub op: String,
    /// Component configuration.
    pub config: Arc<Config>,
}

impl Identity {
    /// Database name qualified with the scope's target resource,
    /// e.g. `orders.line_items`.
    pub fn qualified_resource(&self, scope: &Scope) -> String {
        format!("{}.{}", self.dsn.db_name, scope.target_resource())
    }

    fn target(&self) -> String {
        format!("{}/{}", self.dsn.addr, self.dsn.db_name)
    }
}

/// Decorator factory around a [`Handler`], parameterized by static identity.
pub trait Interceptor: Send + Sync {
    fn wrap(&self, ident: &Identity, next: Handler) -> Handler;
}

/// Compose `interceptors` around `inner`.
///
/// The first interceptor in the list becomes the outermost wrapper and the
/// last sits closest to execution. Performs no I/O and cannot fail.
pub fn compose(interceptors: &[Arc<dyn Interceptor>], ident: &Identity, inner: Handler) -> Handler {
    interceptors
        .iter()
        .rev()
        .fold(inner, |next, interceptor| interceptor.wrap(ident, next))
}

/// Development-mode logging of every operation, with bound values
/// interpolated into the rendered statement. A no-op decorator unless the
/// debug flag is set.
pub struct DebugInterceptor;

impl Interceptor for DebugInterceptor {
    fn wrap(&self, ident: &Identity, next: Handler) -> Handler {
        if !ident.config.debug {
            return next;
        }
        let ident = ident.clone();
        Arc::new(move |scope: &mut Scope| {
            let beg = Instant::now();
            next(scope);
            let elapsed_ms = beg.elapsed().as_millis() as u64;
            let statement = scope.rendered_statement(true);
            if let Some(err) = scope.error() {
                tracing::error!(
                    component = ident.component,
                    addr = %ident.target(),
                    elapsed_ms,
                    statement = %statement,
                    error = %err,
                    "operation failed"
                );
            } else {
                let reply = scope.value().map(|v| v.to_string()).unwrap_or_default();
                tracing::debug!(
                    component = ident.component,
                    addr = %ident.target(),
                    elapsed_ms,
                    statement = %statement,
                    reply = %reply,
                    "operation"
                );
            }
        })
    }
}

/// Mutually exclusive outcome of a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ok,
    Empty,
    Error,
}

impl Outcome {
    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Empty => "Empty",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AccessDecision {
    pub outcome: Outcome,
    /// Warn-level slow log fires.
    pub slow: bool,
    /// Info-level normal log fires. Never together with `slow`.
    pub normal: bool,
}

/// Classify a completed operation and decide which access logs fire.
pub(crate) fn decide_access(
    error: Option<&OperationError>,
    elapsed: Duration,
    config: &Config,
) -> AccessDecision {
    let outcome = match error {
        Some(err) if err.is_not_found() => Outcome::Empty,
        Some(_) => Outcome::Error,
        None => Outcome::Ok,
    };
    let threshold = config.slow_log_threshold();
    let slow = !threshold.is_zero() && elapsed > threshold;
    let normal = config.enable_access_interceptor && outcome == Outcome::Ok && !slow;
    AccessDecision { outcome, slow, normal }
}

/// Counters, latency histogram and access logs per operation.
pub struct MetricInterceptor;

impl Interceptor for MetricInterceptor {
    fn wrap(&self, ident: &Identity, next: Handler) -> Handler {
        let ident = ident.clone();
        Arc::new(move |scope: &mut Scope| {
            let beg = Instant::now();
            next(scope);
            let elapsed = beg.elapsed();

            let resource = ident.qualified_resource(scope);
            let elapsed_ms = elapsed.as_millis() as u64;
            let req = ident
                .config
                .enable_access_interceptor_req
                .then(|| scope.rendered_statement(ident.config.enable_detail_sql));
            let reply = ident
                .config
                .enable_access_interceptor_reply
                .then(|| scope.value().map(|v| v.to_string()).unwrap_or_default());

            let decision = decide_access(scope.error(), elapsed, &ident.config);
            if let Some(err) = scope.error() {
                if decision.outcome == Outcome::Empty {
                    tracing::warn!(
                        op = %ident.op,
                        resource = %resource,
                        elapsed_ms,
                        req = ?req,
                        reply = ?reply,
                        error = %err,
                        event = "error",
                        "access"
                    );
                } else {
                    tracing::error!(
                        op = %ident.op,
                        resource = %resource,
                        elapsed_ms,
                        req = ?req,
                        reply = ?reply,
                        error = %err,
                        event = "error",
                        "access"
                    );
                }
            }
            metrics::incr_handle(&resource, &ident.dsn.addr, decision.outcome.code());
            metrics::observe_handle_seconds(&resource, &ident.dsn.addr, elapsed.as_secs_f64());

            if decision.slow {
                tracing::warn!(
                    op = %ident.op,
                    resource = %resource,
                    elapsed_ms,
                    req = ?req,
                    reply = ?reply,
                    event = "slow",
                    "access"
                );
            }
            if decision.normal {
                tracing::info!(
                    op = %ident.op,
                    resource = %resource,
                    elapsed_ms,
                    req = ?req,
                    reply = ?reply,
                    event = "normal",
                    "access"
                );
            }
        })
    }
}

/// Client span around every operation, parented on the scope's external
/// span when one was supplied.
pub struct TraceInterceptor;

impl TraceInterceptor {
    fn client_span(ident: &Identity, label: &str) -> tracing::Span {
        tracing::info_span!(
            "db.operation",
            otel.name = %label,
            otel.kind = "client",
            component = ident.component,
            db.name = %ident.dsn.db_name,
            server.address = %ident.dsn.addr,
            db.statement = field::Empty,
            otel.status_code = field::Empty,
            error.message = field::Empty,
        )
    }
}

impl Interceptor for TraceInterceptor {
    fn wrap(&self, ident: &Identity, next: Handler) -> Handler {
        let ident = ident.clone();
        Arc::new(move |scope: &mut Scope| {
            let label = StatementInfo::parse(scope.statement()).span_label();
            // A span created while the external parent is entered becomes
            // its child; otherwise the current context parents it.
            let span = match scope.parent_span() {
                Some(parent) => {
                    let _parent = parent.enter();
                    Self::client_span(&ident, &label)
                }
                None => Self::client_span(&ident, &label),
            };
            {
                // Entered guard: the span is released on every exit path.
                let _enter = span.enter();
                next(scope);
            }
            span.record(
                "db.statement",
                scope
                    .rendered_statement(ident.config.enable_detail_sql)
                    .as_str(),
            );
            match scope.error() {
                Some(err) => {
                    span.record("otel.status_code", "ERROR");
                    span.record("error.message", err.to_string().as_str());
                }
                None => {
                    span.record("otel.status_code", "OK");
                }
            }
        })
    }
}
