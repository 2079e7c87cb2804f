//! Process-wide cache of backend handles.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{Backend, ConnectError, ConnectionDescriptor, Connector};

struct RegistryState<T> {
    handles: HashMap<String, Arc<T>>,
}

/// Maps connection descriptors to live handles.
///
/// Handles are created on first use, probed once, and then kept until
/// [`shutdown`](Self::shutdown). One lock guards the map, including the
/// connect and probe of a new handle, so first-time connections to
/// different backends are serialized. Statement execution never holds it.
pub struct Registry<C: Connector> {
    connector: C,
    state: Mutex<RegistryState<C::Conn>>,
    opened: AtomicUsize,
}

impl<C: Connector> Registry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: Mutex::new(RegistryState {
                handles: HashMap::new(),
            }),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn resolve(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<C::Conn>, ConnectError> {
        let key = descriptor.connection_string();
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handles.get(&key) {
            if !handle.is_closed() {
                return Ok(Arc::clone(handle));
            }
            // The driver lost the connection; redial in place.
            warn!(address = %descriptor.address(), "cached backend handle closed, reconnecting");
            state.handles.remove(&key);
        }

        let conn = self.connector.connect(descriptor).await?;
        conn.ping()
            .await
            .map_err(|err| ConnectError::Probe(err.message().to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(address = %descriptor.address(), database = %descriptor.database, "backend handle opened");
        let handle = Arc::new(conn);
        state.handles.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Number of handles currently cached.
    pub async fn len(&self) -> usize {
        self.state.lock().await.handles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Total handles opened since startup, replacements included.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Drops every cached handle exactly once and returns how many there were.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.lock().await;
        let drained: Vec<_> = state.handles.drain().collect();
        let count = drained.len();
        drop(drained);
        info!(handles = count, "registry closed");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConnector, MemoryScript};

    fn descriptor(host: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::new(host, "5432", "app", "pw", "orders")
    }

    #[tokio::test]
    async fn resolve_reuses_handle() {
        let registry = Registry::new(MemoryConnector::new(MemoryScript::new()));
        let first = registry.resolve(&descriptor("a")).await.expect("first");
        let second = registry.resolve(&descriptor("a")).await.expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.opened(), 1);
        assert_eq!(registry.connector().stats().connects(), 1);
    }

    #[tokio::test]
    async fn distinct_descriptors_get_distinct_handles() {
        let registry = Registry::new(MemoryConnector::new(MemoryScript::new()));
        let a = registry.resolve(&descriptor("a")).await.expect("a");
        let b = registry.resolve(&descriptor("b")).await.expect("b");
        let other_db = registry
            .resolve(&ConnectionDescriptor::new("a", "5432", "app", "pw", "billing"))
            .await
            .expect("other db");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other_db));
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn connect_failure_is_not_cached() {
        let connector = MemoryConnector::new(MemoryScript::new()).unreachable("down");
        let registry = Registry::new(connector);
        let err = registry.resolve(&descriptor("down")).await.err();
        assert!(matches!(err, Some(ConnectError::Connect(_))));
        assert!(registry.is_empty().await);
        let _ = registry.resolve(&descriptor("down")).await;
        assert_eq!(registry.connector().stats().connects(), 2);
    }

    #[tokio::test]
    async fn probe_failure_is_not_cached() {
        let connector = MemoryConnector::new(MemoryScript::new().failing_ping("probe refused"));
        let registry = Registry::new(connector);
        let err = registry.resolve(&descriptor("a")).await.err();
        assert_eq!(err, Some(ConnectError::Probe("probe refused".into())));
        assert!(registry.is_empty().await);
        assert_eq!(registry.opened(), 0);
    }

    #[tokio::test]
    async fn closed_handle_is_replaced() {
        let registry = Registry::new(MemoryConnector::new(MemoryScript::new()));
        let first = registry.resolve(&descriptor("a")).await.expect("first");
        first.mark_closed();
        let second = registry.resolve(&descriptor("a")).await.expect("second");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.opened(), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_each_handle_once() {
        let registry = Registry::new(MemoryConnector::new(MemoryScript::new()));
        for host in ["a", "b", "c"] {
            registry.resolve(&descriptor(host)).await.expect("resolve");
        }
        assert_eq!(registry.shutdown().await, 3);
        assert_eq!(registry.connector().stats().closed(), 3);
        assert_eq!(registry.shutdown().await, 0);
        assert_eq!(registry.connector().stats().closed(), 3);
    }

    #[tokio::test]
    async fn concurrent_first_use_opens_one_handle() {
        let registry = Arc::new(Registry::new(MemoryConnector::new(MemoryScript::new())));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.resolve(&descriptor("a")).await.expect("resolve")
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("join"));
        }
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.opened(), 1);
    }
}
