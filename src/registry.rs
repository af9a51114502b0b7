//! Process-wide component registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::component::Component;

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Name → component map with safe concurrent reads and writes.
///
/// Lifecycle: empty at startup, populated by successful builds, read by name
/// thereafter. Re-registering a name overwrites the previous entry (last
/// writer wins); there is no protection against accidental duplicates.
///
/// Builds go to the process-wide instance from [`Registry::global`] unless
/// one is injected through
/// [`Builder::with_registry`](crate::Builder::with_registry).
#[derive(Debug, Default)]
pub struct Registry {
    components: RwLock<HashMap<String, Arc<Component>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Register a component under its logical name.
    pub fn insert(&self, name: impl Into<String>, component: Arc<Component>) {
        self.components
            .write()
            .unwrap()
            .insert(name.into(), component);
    }

    /// Look up a component by logical name.
    pub fn get(&self, name: &str) -> Option<Arc<Component>> {
        self.components.read().unwrap().get(name).cloned()
    }

    /// Names of all registered components.
    pub fn names(&self) -> Vec<String> {
        self.components.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dsn::Dsn;

    fn component(name: &str) -> Arc<Component> {
        struct NoopConnection;
        impl crate::component::Connection for NoopConnection {
            fn ping(&self) -> Result<(), crate::error::DriverError> {
                Ok(())
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        Arc::new(Component::new(
            name.to_string(),
            Arc::new(Dsn::parse("u:p@tcp(127.0.0.1:3306)/testdb").unwrap()),
            Arc::new(Config::default()),
            Box::new(NoopConnection),
            Vec::new(),
        ))
    }

    #[test]
    fn lookup_returns_the_registered_instance() {
        let registry = Registry::new();
        let orders = component("orders");
        registry.insert("orders", Arc::clone(&orders));

        let found = registry.get("orders").unwrap();
        assert!(Arc::ptr_eq(&found, &orders));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn reregistering_overwrites_last_writer_wins() {
        let registry = Registry::new();
        let first = component("orders");
        let second = component("orders");
        registry.insert("orders", Arc::clone(&first));
        registry.insert("orders", Arc::clone(&second));

        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get("orders").unwrap(), &second));
    }

    #[test]
    fn concurrent_reads_and_writes() {
        let registry = Arc::new(Registry::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let name = format!("component-{i}");
                registry.insert(name.clone(), component(&name));
                for j in 0..8 {
                    let _ = registry.get(&format!("component-{j}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }
}
