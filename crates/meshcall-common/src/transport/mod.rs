//! Meshcall Transport Layer
//!
//! The invocation pipeline treats the transport as an opaque capability:
//! establish a connection to a host/port within a bounded timeout, then invoke
//! a method path with a JSON payload. This module defines that contract
//! ([`Transport`] / [`Connection`]) and ships the TCP implementation used by
//! default.
//!
//! # Wire Format
//!
//! - **Transport**: TCP, one connection per call
//! - **Codec**: JSON serialization of protocol messages
//! - **Framing**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! All implementations enforce a maximum message size of 64 MB to prevent
//! memory exhaustion from a misbehaving peer.

pub mod codec;
pub mod tcp;


use crate::protocol::{Result, RpcArgs, RpcResult};
use async_trait::async_trait;
use std::time::Duration;

/// An established connection to one endpoint.
///
/// Payloads flowing through `invoke` are logged at debug level so they land in
/// whichever tracing span is active around the call.
#[async_trait]
pub trait Connection: Send {
    /// Invokes `path` on the remote peer with `args`.
    ///
    /// `deadline`, when present, bounds the whole exchange; an elapsed
    /// deadline surfaces as [`crate::MeshError::Timeout`].
    async fn invoke(
        &mut self,
        path: &str,
        args: RpcArgs,
        deadline: Option<Duration>,
    ) -> Result<RpcResult>;
}

/// Capability of opening connections to arbitrary endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to `host:port`, failing fast once `timeout` elapses.
    async fn connect(&self, host: &str, port: u16, timeout: Duration)
        -> Result<Box<dyn Connection>>;
}

pub use codec::JsonCodec;
pub use tcp::{TcpConnection, TcpTransport};
