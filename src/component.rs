//! Live database component: the connection handle plus its interceptor chain.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::dsn::Dsn;
use crate::error::DriverError;
use crate::interceptor::{compose, Handler, Identity, Interceptor};
use crate::PACKAGE_NAME;

/// Narrow view of an underlying database connection.
///
/// Thread-safety of concurrent use is the connection's own property; this
/// layer adds no locking around it.
pub trait Connection: Send + Sync {
    /// Lightweight liveness probe.
    fn ping(&self) -> Result<(), DriverError>;

    /// Native handle access for the execution layer.
    fn as_any(&self) -> &dyn Any;
}

/// Opens connections for a parsed address. Implemented by the execution
/// layer; the timeouts on the [`Dsn`] are handed over here, at open time.
pub trait Driver: Send + Sync {
    fn open(&self, dsn: &Dsn) -> Result<Box<dyn Connection>, DriverError>;
}

/// Sentinel handle carried by degraded components; every use fails.
struct DeadConnection;

impl Connection for DeadConnection {
    fn ping(&self) -> Result<(), DriverError> {
        Err("connection was never opened (degraded component)".into())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A bootstrapped database component.
///
/// Owns the live connection handle and the interceptor chain configuration.
/// Created once by [`Builder::build`](crate::Builder::build) and shared as
/// `Arc<Component>`; lives until process teardown.
pub struct Component {
    name: String,
    dsn: Arc<Dsn>,
    config: Arc<Config>,
    conn: Box<dyn Connection>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    degraded: bool,
}

impl Component {
    pub(crate) fn new(
        name: String,
        dsn: Arc<Dsn>,
        config: Arc<Config>,
        conn: Box<dyn Connection>,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Self {
        Self {
            name,
            dsn,
            config,
            conn,
            interceptors,
            degraded: false,
        }
    }

    /// A component whose connection could not be opened, produced under the
    /// `degrade` failure policy. Usable but broken: every connection access
    /// fails.
    pub(crate) fn degraded(
        name: String,
        dsn: Arc<Dsn>,
        config: Arc<Config>,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Self {
        Self {
            name,
            dsn,
            config,
            conn: Box::new(DeadConnection),
            interceptors,
            degraded: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether this component was built under the `degrade` policy after a
    /// connection-open failure.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Re-probe connection liveness.
    pub fn ping(&self) -> Result<(), DriverError> {
        self.conn.ping()
    }

    /// The underlying connection handle.
    pub fn connection(&self) -> &dyn Connection {
        self.conn.as_ref()
    }

    /// Downcast the native handle to the concrete driver type.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.conn.as_any().downcast_ref::<T>()
    }

    /// Build the interceptor chain around `inner` for the named operation.
    ///
    /// Called once per operation at wiring time, the way an execution layer
    /// registers its callbacks at startup; the returned handler is immutable
    /// and cheap to clone.
    pub fn wrap_operation(&self, op: impl Into<String>, inner: Handler) -> Handler {
        let ident = Identity {
            component: PACKAGE_NAME,
            name: self.name.clone(),
            dsn: Arc::clone(&self.dsn),
            op: op.into(),
            config: Arc::clone(&self.config),
        };
        compose(&self.interceptors, &ident, inner)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("addr", &self.dsn.addr)
            .field("db_name", &self.dsn.db_name)
            .field("degraded", &self.degraded)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
