//! The service-registry contract.
//!
//! The registry itself (its storage, health probing and quorum semantics) is
//! outside this client; this module pins down exactly what the client
//! consumes: registration, deregistration, a one-shot query, and a long-lived
//! push-based watch of health changes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use meshcall_common::protocol::Result;
use tokio::sync::mpsc;

/// Metadata key carrying an explicit RPC-port override on an instance.
pub const RPC_PORT_META_KEY: &str = "rpcPort";

/// Health-check policy attached to a registration.
///
/// The registry owns the probing; the client only declares the cadence and
/// the grace interval after which a persistently failing instance is dropped.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Deregister the instance after this long of failing checks.
    pub deregister_after: Duration,
    /// Polling interval for the registry's health checks.
    pub check_interval: Duration,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            deregister_after: Duration::from_secs(30),
            check_interval: Duration::from_secs(15),
        }
    }
}

/// Everything the registry needs to advertise one instance.
#[derive(Debug, Clone)]
pub struct ServiceRegistration {
    pub instance_id: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Path the registry probes over HTTP on `host:port`.
    pub health_check_url: String,
    pub weight: u32,
    pub metadata: HashMap<String, String>,
    pub tags: Vec<String>,
    pub check: RegistrationConfig,
}

/// Raw instance descriptor as the registry reports it, before the client
/// shapes it into a [`crate::ServiceInstance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstance {
    pub host: String,
    pub port: u16,
    /// The weight the registry reports for a passing instance.
    pub passing_weight: u32,
    pub metadata: HashMap<String, String>,
    /// Aggregated health status at the time of the event.
    pub healthy: bool,
}

/// Long-lived stream of membership/health changes for one service name.
///
/// Each update is a full replacement set, not a delta; the consumer filters
/// for healthy instances and swaps its view wholesale.
pub struct HealthWatch {
    receiver: mpsc::Receiver<Vec<RawInstance>>,
}

impl HealthWatch {
    pub fn new(receiver: mpsc::Receiver<Vec<RawInstance>>) -> Self {
        Self { receiver }
    }

    /// Waits for the next replacement set. `None` means the registry closed
    /// the stream.
    pub async fn next_update(&mut self) -> Option<Vec<RawInstance>> {
        self.receiver.recv().await
    }
}

/// The store supporting register/deregister/query/watch.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Advertises an instance. Returns whether the registry accepted it.
    async fn register(&self, registration: ServiceRegistration) -> bool;

    /// Withdraws an instance by id. Returns whether anything was removed.
    async fn deregister(&self, instance_id: &str) -> bool;

    /// One-shot query for the current instance list of a service.
    async fn query(&self, service_name: &str) -> Result<Vec<RawInstance>>;

    /// Opens the push-based change stream for a service.
    async fn watch(&self, service_name: &str) -> Result<HealthWatch>;
}
