//! Meshcall Response Types
//!
//! This module defines the RPC response structure returned by remote peers.

use super::RequestId;
use serde::{Deserialize, Serialize};

/// RPC method result (JSON value)
pub type RpcResult = serde_json::Value;

/// An RPC response returned from a remote endpoint to the caller.
///
/// # Fields
///
/// - `id`: the request ID this response answers (for request/response matching)
/// - `result`: the result value (present on success)
/// - `error`: error message (present on failure)
/// - `success`: whether the call succeeded
///
/// # Example
///
/// ```
/// use meshcall_common::protocol::responses::RpcResponse;
/// use serde_json::json;
///
/// let ok = RpcResponse::success(7, json!({"valid": true}));
/// let failed = RpcResponse::error(7, "token expired");
/// assert!(ok.success && !failed.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    /// Request identifier this response corresponds to
    pub id: RequestId,
    /// Result value (present on success)
    pub result: Option<RpcResult>,
    /// Error message (present on failure)
    pub error: Option<String>,
    /// Whether the call succeeded
    pub success: bool,
}

impl RpcResponse {
    /// Creates a successful response carrying `result`.
    pub fn success(id: RequestId, result: RpcResult) -> Self {
        RpcResponse {
            id,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    /// Creates a failed response carrying an error message.
    pub fn error(id: RequestId, error: impl Into<String>) -> Self {
        RpcResponse {
            id,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }
}
