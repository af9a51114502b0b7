//! Component bootstrap: parse the address, build the interceptor chain,
//! open and verify the connection, apply the failure policy, register.

use std::sync::Arc;

use tracing::{error, info};

use crate::component::{Component, Driver};
use crate::config::{Config, ConfigSource, OnFailure};
use crate::dsn::Dsn;
use crate::error::{Error, Result};
use crate::interceptor::{DebugInterceptor, Interceptor, MetricInterceptor, TraceInterceptor};
use crate::metrics;
use crate::registry::Registry;

/// Assembles a [`Component`] from configuration.
///
/// # Example
///
/// ```rust,ignore
/// let component = Builder::load("mysql.orders", &settings)?
///     .with_interceptor(Arc::new(AuditInterceptor))
///     .build(&driver)?;
///
/// let query = component.wrap_operation("query", exec_handler);
/// ```
pub struct Builder {
    name: String,
    config: Config,
    extra: Vec<Arc<dyn Interceptor>>,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("extra", &self.extra.len())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Builder {
    /// Start from an explicit configuration-free builder; combine with
    /// [`with_config`](Self::with_config).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            extra: Vec::new(),
            registry: Registry::global(),
        }
    }

    /// Unmarshal configuration stored under `key` in `source`. The key
    /// doubles as the component's logical name.
    pub fn load(key: &str, source: &dyn ConfigSource) -> Result<Self> {
        let config = Config::from_source(source, key)?;
        Ok(Self {
            name: key.to_string(),
            config,
            extra: Vec::new(),
            registry: Registry::global(),
        })
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Append a caller-supplied interceptor. Caller-supplied interceptors
    /// run inside the built-ins, in the order they were added.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.extra.push(interceptor);
        self
    }

    /// Register the built component into `registry` instead of the
    /// process-wide one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Run the bootstrap sequence.
    ///
    /// A malformed connection string or a failed liveness probe always
    /// aborts the build. A connection-open failure is governed by the
    /// configured failure policy: `panic` aborts with
    /// [`Error::ConnectionOpenFailed`], while `degrade` returns an
    /// unregistered, non-functional component and records an `open-err`
    /// outcome metric.
    pub fn build(self, driver: &dyn Driver) -> Result<Arc<Component>> {
        let dsn = Arc::new(Dsn::parse(&self.config.dsn)?);
        info!(
            name = %self.name,
            addr = %dsn.addr,
            db_name = %dsn.db_name,
            "starting database component"
        );

        // Flag order fixes the chain order: debug, trace, metric, then
        // caller-supplied. First is outermost.
        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        if self.config.debug {
            interceptors.push(Arc::new(DebugInterceptor));
        }
        if self.config.enable_trace_interceptor {
            interceptors.push(Arc::new(TraceInterceptor));
        }
        if self.config.enable_metric_interceptor {
            interceptors.push(Arc::new(MetricInterceptor));
        }
        interceptors.extend(self.extra);

        let config = Arc::new(self.config);
        let conn = match driver.open(&dsn) {
            Ok(conn) => conn,
            Err(cause) => match config.on_failure {
                OnFailure::Panic => {
                    error!(
                        name = %self.name,
                        addr = %dsn.addr,
                        error = %cause,
                        config = ?config,
                        "open database"
                    );
                    return Err(Error::ConnectionOpenFailed {
                        addr: dsn.addr.clone(),
                        cause,
                    });
                }
                OnFailure::Degrade => {
                    metrics::incr_handle(&format!("{}.ping", self.name), &dsn.addr, "open-err");
                    error!(
                        name = %self.name,
                        addr = %dsn.addr,
                        error = %cause,
                        "open database, serving degraded component"
                    );
                    return Ok(Arc::new(Component::degraded(
                        self.name,
                        dsn,
                        config,
                        interceptors,
                    )));
                }
            },
        };

        if let Err(cause) = conn.ping() {
            error!(
                name = %self.name,
                addr = %dsn.addr,
                error = %cause,
                config = ?config,
                "ping database"
            );
            return Err(Error::LivenessCheckFailed {
                addr: dsn.addr.clone(),
                cause,
            });
        }

        let component = Arc::new(Component::new(
            self.name.clone(),
            dsn,
            config,
            conn,
            interceptors,
        ));
        self.registry.insert(self.name, Arc::clone(&component));
        Ok(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Connection;
    use crate::error::{DriverError, OperationError};
    use crate::interceptor::{Handler, Identity};
    use crate::scope::Scope;
    // `use super::*` pulls in the crate's `error::Result` alias; the trait
    // impls below implement `Connection`/`Driver`, whose signatures use the
    // std `Result`. Restore the prelude type in this scope.
    use std::result::Result;
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubConnection {
        pings: Arc<AtomicUsize>,
        fail_ping: bool,
    }

    impl Connection for StubConnection {
        fn ping(&self) -> Result<(), DriverError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.fail_ping {
                Err("server has gone away".into())
            } else {
                Ok(())
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct StubDriver {
        fail_open: bool,
        fail_ping: bool,
        pings: Arc<AtomicUsize>,
    }

    impl Driver for StubDriver {
        fn open(&self, _dsn: &Dsn) -> Result<Box<dyn Connection>, DriverError> {
            if self.fail_open {
                return Err("connection refused".into());
            }
            Ok(Box::new(StubConnection {
                pings: Arc::clone(&self.pings),
                fail_ping: self.fail_ping,
            }))
        }
    }

    const DSN: &str = "user:pass@tcp(127.0.0.1:3306)/orders";

    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_test_writer()
            .try_init();
    }

    fn builder(config: Config) -> Builder {
        Builder::new("orders")
            .with_config(config)
            .with_registry(Arc::new(Registry::new()))
    }

    #[test]
    fn malformed_address_aborts_before_anything_else() {
        let registry = Arc::new(Registry::new());
        let err = Builder::new("orders")
            // even the degrade policy has no say over a malformed address
            .with_config(Config::new("not a dsn").with_on_failure(OnFailure::Degrade))
            .with_registry(Arc::clone(&registry))
            .build(&StubDriver { fail_open: true, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, Error::MalformedAddress(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn successful_build_registers_the_component() {
        init_test_tracing();
        let registry = Arc::new(Registry::new());
        let driver = StubDriver::default();
        let component = Builder::new("orders")
            .with_config(Config::new(DSN))
            .with_registry(Arc::clone(&registry))
            .build(&driver)
            .unwrap();

        assert!(!component.is_degraded());
        assert_eq!(component.name(), "orders");
        assert_eq!(component.dsn().addr, "127.0.0.1:3306");
        // liveness was verified exactly once during bootstrap
        assert_eq!(driver.pings.load(Ordering::SeqCst), 1);
        // lookup returns the same instance the build returned
        let found = registry.get("orders").unwrap();
        assert!(Arc::ptr_eq(&found, &component));
    }

    #[test]
    fn open_failure_with_panic_policy_aborts() {
        let registry = Arc::new(Registry::new());
        let err = Builder::new("orders")
            .with_config(Config::new(DSN))
            .with_registry(Arc::clone(&registry))
            .build(&StubDriver { fail_open: true, ..Default::default() })
            .unwrap_err();

        assert!(matches!(err, Error::ConnectionOpenFailed { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn open_failure_with_degrade_policy_returns_broken_component() {
        init_test_tracing();
        let registry = Arc::new(Registry::new());
        let driver = StubDriver { fail_open: true, ..Default::default() };
        let before = metrics::handle_total("degraded.ping", "127.0.0.1:3306", "open-err");

        let component = Builder::new("degraded")
            .with_config(Config::new(DSN).with_on_failure(OnFailure::Degrade))
            .with_registry(Arc::clone(&registry))
            .build(&driver)
            .unwrap();

        assert!(component.is_degraded());
        assert!(component.ping().is_err());
        // no liveness check on the degraded path
        assert_eq!(driver.pings.load(Ordering::SeqCst), 0);
        // not registered
        assert!(registry.is_empty());
        // one open-err outcome recorded
        let after = metrics::handle_total("degraded.ping", "127.0.0.1:3306", "open-err");
        assert_eq!(after, before + 1);
    }

    #[test]
    fn liveness_failure_is_fatal_regardless_of_policy() {
        for policy in [OnFailure::Panic, OnFailure::Degrade] {
            let registry = Arc::new(Registry::new());
            let err = Builder::new("orders")
                .with_config(Config::new(DSN).with_on_failure(policy))
                .with_registry(Arc::clone(&registry))
                .build(&StubDriver { fail_ping: true, ..Default::default() })
                .unwrap_err();

            assert!(matches!(err, Error::LivenessCheckFailed { .. }));
            assert!(registry.is_empty());
        }
    }

    #[test]
    fn load_reads_configuration_by_key() {
        let settings = json!({
            "mysql": {
                "orders": {
                    "dsn": DSN,
                    "on_failure": "degrade"
                }
            }
        });
        let component = Builder::load("mysql.orders", &settings)
            .unwrap()
            .with_registry(Arc::new(Registry::new()))
            .build(&StubDriver::default())
            .unwrap();
        assert_eq!(component.name(), "mysql.orders");
        assert_eq!(component.config().on_failure, OnFailure::Degrade);
    }

    #[test]
    fn load_with_missing_key_fails() {
        let settings = json!({ "mysql": {} });
        let err = Builder::load("mysql.orders", &settings).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    struct Tagging {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Tagging {
        fn wrap(&self, ident: &Identity, next: Handler) -> Handler {
            let log = Arc::clone(&self.log);
            let op = ident.op.clone();
            Arc::new(move |scope: &mut Scope| {
                log.lock().unwrap().push(op.clone());
                next(scope);
            })
        }
    }

    #[test]
    fn caller_supplied_interceptors_join_the_chain() {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let component = builder(
            Config::new(DSN)
                .with_trace(false)
                .with_metric(false),
        )
        .with_interceptor(Arc::new(Tagging { log: Arc::clone(&log) }))
        .build(&StubDriver::default())
        .unwrap();

        let handler = component.wrap_operation(
            "query",
            Arc::new(|scope: &mut Scope| scope.set_value(json!(1))),
        );
        let mut scope = Scope::new("SELECT * FROM orders");
        handler(&mut scope);

        assert_eq!(*log.lock().unwrap(), vec!["query"]);
        assert_eq!(scope.value(), Some(&json!(1)));
    }

    #[test]
    fn operation_errors_pass_through_the_full_chain() {
        let component = builder(Config::new(DSN))
            .build(&StubDriver::default())
            .unwrap();

        let handler = component.wrap_operation(
            "query",
            Arc::new(|scope: &mut Scope| scope.fail(OperationError::NotFound)),
        );
        let mut scope = Scope::new("SELECT * FROM orders WHERE id = ?").with_binds(vec![json!(404)]);
        handler(&mut scope);

        assert!(scope.error().unwrap().is_not_found());
    }
}
