//! Tracing configuration for outbound calls.
//!
//! The tracing backend itself is external; this module only knows where the
//! collector lives and how to open a per-call client span. When the caller
//! does not hand a span to the pipeline, one is created here from the
//! configured collector endpoint, in single-span-per-call mode: the client
//! and server sides share one span.

use tracing::Span;

/// Where spans are reported and under which service identity.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Collector host.
    pub collector_host: String,
    /// Collector port.
    pub collector_port: u16,
    /// Collector ingestion path.
    pub collector_path: String,
    /// Endpoint recorded as the span's local address.
    pub recorder_endpoint: String,
    /// Logical name of the calling service.
    pub service_name: String,
    /// Client and server share a single span per call.
    pub shared_span: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            collector_host: "localhost".to_string(),
            collector_port: 9411,
            collector_path: "/api/v2/spans".to_string(),
            recorder_endpoint: "localhost:0".to_string(),
            service_name: "meshcall".to_string(),
            shared_span: true,
        }
    }
}

impl TraceConfig {
    /// Full collector URL spans are shipped to.
    pub fn collector_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.collector_host, self.collector_port, self.collector_path
        )
    }

    /// Opens the client span for one outbound call.
    pub fn client_span(&self, path: &str) -> Span {
        tracing::info_span!(
            "rpc_client_call",
            service = %self.service_name,
            path = %path,
            collector = %self.collector_url(),
            endpoint = %self.recorder_endpoint,
            shared = self.shared_span,
        )
    }
}
