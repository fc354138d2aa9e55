//! Construct-once cache of backend service handles.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::config::ConfigError;

/// Identifies one kind of backend service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKind(pub &'static str);

impl ServiceKind {
    pub const ARXIV: ServiceKind = ServiceKind("arxiv");
    pub const CALCULATOR: ServiceKind = ServiceKind("calculator");

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Errors from service construction or lookup
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to construct service '{kind}': {source}")]
    Construction {
        kind: ServiceKind,
        #[source]
        source: ConfigError,
    },

    #[error("service '{0}' has not been constructed")]
    NotConstructed(ServiceKind),

    #[error("service '{kind}' is not a {expected}")]
    TypeMismatch {
        kind: ServiceKind,
        expected: &'static str,
    },
}

type Handle = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Handle>>;

/// Registry for backend services.
///
/// Each [`ServiceKind`] owns a slot that is filled at most once. Concurrent
/// first callers of [`get_or_try_init`](Self::get_or_try_init) for the same
/// kind wait on a single construction and all receive the same `Arc`.
#[derive(Default)]
pub struct ServiceRegistry {
    slots: Mutex<HashMap<ServiceKind, Slot>>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("constructed", &self.constructed())
            .finish()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: ServiceKind) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(kind).or_default().clone()
    }

    /// Return the handle for `kind`, constructing it with `init` on first use.
    ///
    /// A failed `init` leaves the slot empty so a later call may try again.
    pub async fn get_or_try_init<T, F, Fut>(
        &self,
        kind: ServiceKind,
        init: F,
    ) -> Result<Arc<T>, ServiceError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ConfigError>>,
    {
        let slot = self.slot(kind);
        let handle = slot
            .get_or_try_init(|| async {
                tracing::debug!("Constructing service '{}'", kind);
                let service = init()
                    .await
                    .map_err(|source| ServiceError::Construction { kind, source })?;
                tracing::info!("Service '{}' ready", kind);
                Ok::<Handle, ServiceError>(Arc::new(service))
            })
            .await?;

        downcast(kind, handle.clone())
    }

    /// Return an already constructed handle
    pub fn get<T>(&self, kind: ServiceKind) -> Result<Arc<T>, ServiceError>
    where
        T: Any + Send + Sync,
    {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let handle = slots
            .get(&kind)
            .and_then(|slot| slot.get().cloned())
            .ok_or(ServiceError::NotConstructed(kind))?;
        drop(slots);

        downcast(kind, handle)
    }

    /// Whether `kind` has a constructed handle
    pub fn contains(&self, kind: ServiceKind) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&kind).is_some_and(|slot| slot.initialized())
    }

    /// Kinds with a constructed handle, sorted
    pub fn constructed(&self) -> Vec<ServiceKind> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let mut kinds: Vec<ServiceKind> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Drop the registry's reference to `kind`'s handle
    pub fn teardown(&self, kind: ServiceKind) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let removed = slots
            .remove(&kind)
            .is_some_and(|slot| slot.initialized());
        if removed {
            tracing::debug!("Service '{}' torn down", kind);
        }
        removed
    }

    /// Tear down every service
    pub fn shutdown(&self) {
        for kind in self.constructed() {
            self.teardown(kind);
        }
    }
}

fn downcast<T>(kind: ServiceKind, handle: Handle) -> Result<Arc<T>, ServiceError>
where
    T: Any + Send + Sync,
{
    handle
        .downcast::<T>()
        .map_err(|_| ServiceError::TypeMismatch {
            kind,
            expected: std::any::type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Widget(usize);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_constructs_once() {
        let registry = Arc::new(ServiceRegistry::new());
        let constructions = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            let constructions = constructions.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .get_or_try_init(ServiceKind::ARXIV, || async move {
                        let n = constructions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Widget(n))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        let first = &handles[0];
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, first)));
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let registry = ServiceRegistry::new();

        let err = registry
            .get_or_try_init::<Widget, _, _>(ServiceKind::CALCULATOR, || async {
                Err(ConfigError::Missing("calculator.enabled_operations".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Construction { .. }));
        assert!(!registry.contains(ServiceKind::CALCULATOR));

        let widget = registry
            .get_or_try_init(ServiceKind::CALCULATOR, || async { Ok(Widget(7)) })
            .await
            .unwrap();
        assert_eq!(widget.0, 7);
    }

    #[tokio::test]
    async fn test_get_and_type_mismatch() {
        let registry = ServiceRegistry::new();
        assert!(matches!(
            registry.get::<Widget>(ServiceKind::ARXIV),
            Err(ServiceError::NotConstructed(_))
        ));

        registry
            .get_or_try_init(ServiceKind::ARXIV, || async { Ok(Widget(1)) })
            .await
            .unwrap();

        assert_eq!(registry.get::<Widget>(ServiceKind::ARXIV).unwrap().0, 1);
        assert!(matches!(
            registry.get::<String>(ServiceKind::ARXIV),
            Err(ServiceError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_drops_handles() {
        let registry = ServiceRegistry::new();
        registry
            .get_or_try_init(ServiceKind::ARXIV, || async { Ok(Widget(1)) })
            .await
            .unwrap();
        registry
            .get_or_try_init(ServiceKind::CALCULATOR, || async { Ok(Widget(2)) })
            .await
            .unwrap();
        assert_eq!(
            registry.constructed(),
            vec![ServiceKind::ARXIV, ServiceKind::CALCULATOR]
        );

        registry.shutdown();
        assert!(registry.constructed().is_empty());
        assert!(registry.get::<Widget>(ServiceKind::ARXIV).is_err());
    }
}
