//! Typed client for the mesh's token-verification service.
//!
//! Shows the intended shape of a service client: a thin struct owning an
//! [`InvocationPipeline`] and exposing typed methods, with the service name
//! and balancer supplied at construction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Span;

use meshcall_common::protocol::Result;
use meshcall_common::transport::Transport;
use meshcall_discover::InstanceCache;

use crate::load_balance::LoadBalance;
use crate::pipeline::InvocationPipeline;

const DEFAULT_SERVICE_NAME: &str = "oauth";
const CHECK_TOKEN_PATH: &str = "/oauth/check-token";
const CHECK_TOKEN_COMMAND: &str = "token_check";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckTokenResponse {
    pub valid: bool,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Client for token verification calls.
pub struct TokenClient {
    pipeline: InvocationPipeline,
}

impl TokenClient {
    /// Builds a client over the given discovery cache and transport.
    ///
    /// `service_name` falls back to `"oauth"` when `None`; `load_balance`
    /// falls back to the pipeline's default random policy.
    pub fn new(
        service_name: Option<String>,
        cache: Arc<InstanceCache>,
        transport: Arc<dyn Transport>,
        load_balance: Option<Arc<dyn LoadBalance>>,
    ) -> Self {
        let service_name =
            service_name.unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let mut pipeline = InvocationPipeline::new(service_name, cache, transport);
        if let Some(lb) = load_balance {
            pipeline = pipeline.with_load_balance(lb);
        }
        Self { pipeline }
    }

    /// Verifies a token against the token service.
    pub async fn check_token(
        &self,
        token: &str,
        span: Option<Span>,
    ) -> Result<CheckTokenResponse> {
        let request = CheckTokenRequest {
            token: token.to_string(),
        };
        let result = self
            .pipeline
            .invoke(
                CHECK_TOKEN_PATH,
                CHECK_TOKEN_COMMAND,
                span,
                None,
                serde_json::to_value(&request)?,
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }
}
