//! In-process [`Registry`] implementation.
//!
//! Backs local development and the test suites; the production registry is
//! expected to be an external store implementing the same contract.

use async_trait::async_trait;
use dashmap::DashMap;
use meshcall_common::protocol::Result;
use tokio::sync::mpsc;

use crate::registry::{
    HealthWatch, RawInstance, Registry, ServiceRegistration,
};

/// Registry keeping all state in memory.
///
/// Watches are plain bounded channels; a watcher that falls behind by more
/// than the channel capacity delays publishers rather than dropping events.
#[derive(Default)]
pub struct MemoryRegistry {
    services: DashMap<String, Vec<RawInstance>>,
    registrations: DashMap<String, ServiceRegistration>,
    watchers: DashMap<String, Vec<mpsc::Sender<Vec<RawInstance>>>>,
}

const WATCH_CHANNEL_CAPACITY: usize = 16;

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a service's instance set and notifies every watcher.
    ///
    /// This is how health transitions enter the registry: callers push the
    /// full new membership, exactly as an external registry's watch plan
    /// would deliver it.
    pub async fn push_update(&self, service_name: &str, instances: Vec<RawInstance>) {
        self.services
            .insert(service_name.to_string(), instances.clone());
        self.notify(service_name, instances).await;
    }

    async fn notify(&self, service_name: &str, instances: Vec<RawInstance>) {
        let senders = match self.watchers.get(service_name) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        let mut saw_closed = false;
        for sender in senders {
            if sender.send(instances.clone()).await.is_err() {
                saw_closed = true;
            }
        }
        if saw_closed {
            if let Some(mut entry) = self.watchers.get_mut(service_name) {
                entry.value_mut().retain(|sender| !sender.is_closed());
            }
        }
    }

    fn raw_from(registration: &ServiceRegistration) -> RawInstance {
        RawInstance {
            host: registration.host.clone(),
            port: registration.port,
            passing_weight: registration.weight,
            metadata: registration.metadata.clone(),
            healthy: true,
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn register(&self, registration: ServiceRegistration) -> bool {
        let service_name = registration.service_name.clone();
        let raw = Self::raw_from(&registration);

        self.registrations
            .insert(registration.instance_id.clone(), registration);

        let updated = {
            let mut entry = self.services.entry(service_name.clone()).or_default();
            entry
                .value_mut()
                .retain(|i| (i.host.as_str(), i.port) != (raw.host.as_str(), raw.port));
            entry.value_mut().push(raw);
            entry.value().clone()
        };

        tracing::info!(service = %service_name, "registered service instance");
        self.notify(&service_name, updated).await;
        true
    }

    async fn deregister(&self, instance_id: &str) -> bool {
        let Some((_, registration)) = self.registrations.remove(instance_id) else {
            return false;
        };

        let updated = {
            let mut entry = self
                .services
                .entry(registration.service_name.clone())
                .or_default();
            entry.value_mut().retain(|i| {
                (i.host.as_str(), i.port) != (registration.host.as_str(), registration.port)
            });
            entry.value().clone()
        };

        tracing::info!(service = %registration.service_name, "deregistered service instance");
        self.notify(&registration.service_name, updated).await;
        true
    }

    async fn query(&self, service_name: &str) -> Result<Vec<RawInstance>> {
        Ok(self
            .services
            .get(service_name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn watch(&self, service_name: &str) -> Result<HealthWatch> {
        let (sender, receiver) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        self.watchers
            .entry(service_name.to_string())
            .or_default()
            .push(sender);
        Ok(HealthWatch::new(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistrationConfig;
    use std::collections::HashMap;

    fn registration(id: &str, service: &str, host: &str, port: u16) -> ServiceRegistration {
        ServiceRegistration {
            instance_id: id.to_string(),
            service_name: service.to_string(),
            host: host.to_string(),
            port,
            health_check_url: "/health".to_string(),
            weight: 1,
            metadata: HashMap::new(),
            tags: vec![],
            check: RegistrationConfig::default(),
        }
    }

    #[tokio::test]
    async fn register_then_query() {
        let registry = MemoryRegistry::new();
        assert!(registry.register(registration("i1", "oauth", "10.0.0.1", 8001)).await);

        let instances = registry.query("oauth").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].host, "10.0.0.1");
    }

    #[tokio::test]
    async fn deregister_removes_the_instance() {
        let registry = MemoryRegistry::new();
        registry.register(registration("i1", "oauth", "10.0.0.1", 8001)).await;
        assert!(registry.deregister("i1").await);
        assert!(!registry.deregister("i1").await);

        let instances = registry.query("oauth").await.unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn query_of_unknown_service_is_empty_not_an_error() {
        let registry = MemoryRegistry::new();
        let instances = registry.query("nothing-here").await.unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn watchers_observe_registrations() {
        let registry = MemoryRegistry::new();
        let mut watch = registry.watch("oauth").await.unwrap();

        registry.register(registration("i1", "oauth", "10.0.0.1", 8001)).await;

        let update = watch.next_update().await.unwrap();
        assert_eq!(update.len(), 1);
        assert!(update[0].healthy);
    }

    #[tokio::test]
    async fn push_update_reaches_every_watcher() {
        let registry = MemoryRegistry::new();
        let mut first = registry.watch("oauth").await.unwrap();
        let mut second = registry.watch("oauth").await.unwrap();

        registry.push_update("oauth", vec![]).await;

        assert_eq!(first.next_update().await.unwrap(), vec![]);
        assert_eq!(second.next_update().await.unwrap(), vec![]);
    }
}
