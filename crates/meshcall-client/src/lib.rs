//! Meshcall Client
//!
//! The invocation side of the meshcall RPC pipeline: given a logical service
//! name and a method path, resolve a healthy endpoint, pick one instance,
//! guard the call with a per-command circuit breaker and deliver it with
//! tracing context attached.
//!
//! # Components
//!
//! - [`load_balance`] - the [`LoadBalance`] policy seam with random and
//!   smooth weighted round-robin implementations
//! - [`circuit_breaker`] - per-command rolling-window breaker and its registry
//! - [`trace`] - tracing configuration and per-call client spans
//! - [`pipeline`] - [`InvocationPipeline`], the decorator sequencing
//!   hooks → breaker → discovery → selection → transport call → hooks
//! - [`token_client`] - a typed client wrapper built on the pipeline
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshcall_client::pipeline::InvocationPipeline;
//! use meshcall_common::transport::TcpTransport;
//! use meshcall_discover::{InstanceCache, MemoryRegistry};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(InstanceCache::new(Arc::new(MemoryRegistry::new())));
//! let pipeline = InvocationPipeline::new("oauth", cache, Arc::new(TcpTransport::new()));
//!
//! let response = pipeline
//!     .invoke("/oauth/check-token", "token_check", None, None, json!({"token": "t"}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod load_balance;
pub mod pipeline;
pub mod token_client;
pub mod trace;

pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerRegistry};
pub use load_balance::{LoadBalance, RandomLoadBalance, WeightedRoundRobinLoadBalance};
pub use pipeline::{InvocationContext, InvocationPipeline};
pub use token_client::TokenClient;
pub use trace::TraceConfig;
