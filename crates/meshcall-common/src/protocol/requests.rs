use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

pub type RequestId = u64;
pub type MethodPath = String;
pub type RpcArgs = serde_json::Value;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One outbound RPC call on the wire.
///
/// `path` is the full method path of the remote operation (for example
/// `/oauth/check-token`); `args` is the JSON payload. `deadline_ms`, when set,
/// tells the peer how long the caller is willing to wait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub id: RequestId,
    pub path: MethodPath,
    pub args: RpcArgs,
    pub deadline_ms: Option<u64>,
}

impl RpcRequest {
    pub fn new(path: impl Into<String>, args: RpcArgs) -> Self {
        RpcRequest {
            id: generate_request_id(),
            path: path.into(),
            args,
            deadline_ms: None,
        }
    }

    pub fn with_deadline(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }
}

fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    // Counter in the low half, wall clock in the high half. The counter alone
    // guarantees process-local uniqueness even when the clock is stuck.
    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    (timestamp & 0xFFFFFFFF00000000) | (counter & 0xFFFFFFFF)
}
