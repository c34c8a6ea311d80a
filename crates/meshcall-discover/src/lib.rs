//! Meshcall Service Discovery
//!
//! This crate resolves logical service names to healthy network endpoints.
//!
//! # Overview
//!
//! Discovery is split into three pieces:
//!
//! - [`instance`] - [`ServiceInstance`], the value describing one endpoint
//! - [`registry`] - the [`Registry`] contract the mesh's registry store must
//!   satisfy (register / deregister / query / watch)
//! - [`cache`] - [`InstanceCache`], the per-service-name cache that keeps the
//!   hot path off the network by consuming the registry's push-based watch
//!
//! # Resolution Model
//!
//! The first resolve of a name pays one blocking registry query and starts a
//! long-lived watch task for that name; every later resolve is a lock-free
//! in-memory read. Health changes arrive asynchronously and replace the cached
//! instance list wholesale, so callers never observe a partially updated set.

pub mod cache;
pub mod instance;
pub mod memory;
pub mod registry;

pub use cache::InstanceCache;
pub use instance::{InstanceId, ServiceInstance};
pub use memory::MemoryRegistry;
pub use registry::{
    HealthWatch, RawInstance, Registry, RegistrationConfig, ServiceRegistration,
    RPC_PORT_META_KEY,
};
