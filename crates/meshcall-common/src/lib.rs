//! Meshcall Common Types and Transport
//!
//! This crate provides the protocol definitions, the error taxonomy and the
//! TCP transport layer shared by the meshcall RPC client pipeline.
//!
//! # Overview
//!
//! Meshcall is a client-side RPC invocation pipeline for a microservice mesh.
//! This crate contains the infrastructure consumed by the discovery cache and
//! the invocation decorator:
//!
//! - **Protocol Layer**: Request/Response types and the error taxonomy
//! - **Transport Layer**: TCP-based communication with JSON serialization
//! - **Rate Gate**: token-bucket admission control applied ahead of the pipeline
//!
//! # Architecture
//!
//! The wire protocol is deliberately small:
//! - **Transport**: TCP, one connection per call
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 64 MB (prevents memory exhaustion)
//!
//! # Components
//!
//! - [`protocol`] - Protocol types ([`RpcRequest`], [`RpcResponse`], [`MeshError`])
//! - [`transport`] - The [`transport::Transport`] contract and its TCP implementation
//! - [`rate_limit`] - The [`rate_limit::TokenGate`] admission gate

pub mod protocol;
pub mod rate_limit;
pub mod transport;

pub use protocol::*;
