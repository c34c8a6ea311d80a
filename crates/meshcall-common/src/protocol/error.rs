use thiserror::Error;

/// Error taxonomy for the invocation pipeline.
///
/// Every failure a caller can observe falls into one of these categories.
/// Registry failures during cache population are deliberately absent: they are
/// absorbed by the cache (logged, never surfaced) and manifest to callers only
/// as [`MeshError::InstancesUnavailable`] on the next resolve.
#[derive(Error, Debug)]
pub enum MeshError {
    /// No instances resolved for the service name, or the cached list is empty.
    #[error("service instances are not available")]
    InstancesUnavailable,

    /// The selected instance has no RPC-capable port. Terminal for the call,
    /// never retried.
    #[error("no rpc endpoint on instance {host}:{port}")]
    NoRpcEndpoint { host: String, port: u16 },

    /// The circuit breaker guarding this command short-circuited the call
    /// without attempting it.
    #[error("circuit breaker '{0}' is open")]
    BreakerOpen(String),

    /// The token-bucket gate rejected the call before it entered the pipeline.
    #[error("rate limit exceeded")]
    LimitExceeded,

    /// A before/after hook aborted the pipeline.
    #[error("hook error: {0}")]
    Hook(String),

    /// Endpoint could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The call reached the wire but failed in transit.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote peer answered with a call-level failure.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// A bounded operation did not complete in time.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The peer answered with something the codec cannot accept.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The registry rejected or failed an operation invoked directly
    /// (registration paths, not cache population).
    #[error("registry error: {0}")]
    Registry(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeshError>;
