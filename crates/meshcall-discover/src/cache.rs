//! Per-service-name instance cache.
//!
//! The cache keeps the invocation hot path off the network: after a name's
//! first resolve, lookups are lock-free in-memory reads, and freshness comes
//! from a long-lived watch task that replaces the stored list whenever the
//! registry reports a new healthy set.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::instance::ServiceInstance;
use crate::registry::Registry;

/// Cache of healthy instances, one entry per logical service name.
///
/// # Resolution Contract
///
/// [`resolve`](Self::resolve) never returns an error and never blocks on the
/// network after a name's first successful population. An empty slice means
/// "no instances available"; there is no nil/empty distinction for callers
/// to trip over.
///
/// # Ownership
///
/// Each entry is written only by the initial populator and by that name's
/// watch task; everyone else reads. Entries are replaced wholesale
/// (`Arc<[ServiceInstance]>` swapped in one map insert), never patched, so a
/// reader can never observe a partially updated list.
pub struct InstanceCache {
    registry: Arc<dyn Registry>,
    entries: Arc<DashMap<String, Arc<[ServiceInstance]>>>,
    /// Population gate: held across the re-check, the registry query and the
    /// watch-task start, so concurrent first-misses collapse into one query.
    /// The guarded set records which names already have a watch running.
    watched: Mutex<HashSet<String>>,
    watch_tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl InstanceCache {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            entries: Arc::new(DashMap::new()),
            watched: Mutex::new(HashSet::new()),
            watch_tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Resolves a service name to its current instance list.
    ///
    /// Fast path: a lock-free read of the entry map. Slow path (first miss):
    /// one blocking registry query under the cache-wide population lock, plus
    /// the one-time start of the name's watch task. A registry failure during
    /// population stores an empty list, so subsequent calls fail fast instead
    /// of retry-storming the registry; the failure is logged, never surfaced
    /// here.
    pub async fn resolve(&self, service_name: &str) -> Arc<[ServiceInstance]> {
        if let Some(entry) = self.entries.get(service_name) {
            return entry.value().clone();
        }

        let mut watched = self.watched.lock().await;

        // Double-checked: another caller may have populated while we waited.
        if let Some(entry) = self.entries.get(service_name) {
            return entry.value().clone();
        }

        if watched.insert(service_name.to_string()) {
            self.spawn_watch(service_name.to_string());
        }

        let instances: Arc<[ServiceInstance]> = match self.registry.query(service_name).await {
            Ok(raw) => raw.iter().map(ServiceInstance::from_raw).collect(),
            Err(e) => {
                tracing::error!(
                    service = service_name,
                    error = %e,
                    "registry query failed during cache population"
                );
                Vec::new().into()
            }
        };

        self.entries
            .insert(service_name.to_string(), instances.clone());
        instances
    }

    /// Current number of cached service names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Starts the long-lived watch task for one name. Runs until the registry
    /// closes the stream or the cache is dropped.
    fn spawn_watch(&self, service_name: String) {
        let registry = self.registry.clone();
        let entries = self.entries.clone();

        let handle = tokio::spawn(async move {
            let mut watch = match registry.watch(&service_name).await {
                Ok(watch) => watch,
                Err(e) => {
                    tracing::error!(
                        service = %service_name,
                        error = %e,
                        "failed to open registry watch"
                    );
                    return;
                }
            };

            while let Some(raw) = watch.next_update().await {
                let healthy: Arc<[ServiceInstance]> = raw
                    .iter()
                    .filter(|instance| instance.healthy)
                    .map(ServiceInstance::from_raw)
                    .collect();

                tracing::debug!(
                    service = %service_name,
                    instances = healthy.len(),
                    "replacing cached instance set"
                );
                entries.insert(service_name.clone(), healthy);
            }

            tracing::debug!(service = %service_name, "registry watch stream ended");
        });

        if let Ok(mut tasks) = self.watch_tasks.lock() {
            tasks.push(handle);
        }
    }
}

impl Drop for InstanceCache {
    fn drop(&mut self) {
        if let Ok(tasks) = self.watch_tasks.lock() {
            for task in tasks.iter() {
                task.abort();
            }
        }
    }
}
