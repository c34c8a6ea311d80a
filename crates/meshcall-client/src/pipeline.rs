//! The invocation decorator.
//!
//! [`InvocationPipeline`] sequences one outbound call:
//!
//! ```text
//! Idle -> BeforeHooks -> BreakerGuard{Resolving -> Selecting -> Connecting -> Calling}
//!      -> AfterHooks -> Done
//! ```
//!
//! Every stage is a short-circuit point; a failing stage transitions straight
//! to `Done(error)` with the error unchanged. No retry happens inside the
//! pipeline: the breaker's rolling window is the only failure memory kept,
//! and retry composition belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, Span};

use meshcall_common::protocol::{MeshError, Result, RpcArgs, RpcResult};
use meshcall_common::rate_limit::TokenGate;
use meshcall_common::transport::Transport;
use meshcall_discover::InstanceCache;

use crate::circuit_breaker::{BreakerConfig, CircuitBreakerRegistry};
use crate::load_balance::{LoadBalance, RandomLoadBalance};
use crate::trace::TraceConfig;

/// Hook run before or after the guarded call. The first hook error aborts the
/// rest of the pipeline and is returned to the caller unchanged.
pub type Hook = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Default bound on transport connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Ephemeral per-call state: the method path, the caller's deadline and the
/// span the call is delivered under. Created at invoke-time, gone when the
/// call returns.
pub struct InvocationContext {
    pub path: String,
    pub deadline: Option<Duration>,
    pub span: Span,
}

/// Client-side decorator delivering calls for one logical service name.
///
/// Collaborators arrive by constructor injection; nothing is read from
/// process-wide state. The load balancer defaults to [`RandomLoadBalance`]
/// and can be swapped per pipeline.
pub struct InvocationPipeline {
    service_name: String,
    cache: Arc<InstanceCache>,
    transport: Arc<dyn Transport>,
    load_balance: Arc<dyn LoadBalance>,
    breakers: CircuitBreakerRegistry,
    trace: TraceConfig,
    connect_timeout: Duration,
    before: Vec<Hook>,
    after: Vec<Hook>,
}

impl InvocationPipeline {
    pub fn new(
        service_name: impl Into<String>,
        cache: Arc<InstanceCache>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            cache,
            transport,
            load_balance: Arc::new(RandomLoadBalance::new()),
            breakers: CircuitBreakerRegistry::new(BreakerConfig::default()),
            trace: TraceConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Swaps the selection policy.
    pub fn with_load_balance(mut self, load_balance: Arc<dyn LoadBalance>) -> Self {
        self.load_balance = load_balance;
        self
    }

    /// Replaces the breaker tuning used for every command on this pipeline.
    pub fn with_breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breakers = CircuitBreakerRegistry::new(config);
        self
    }

    pub fn with_trace_config(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Registers a hook to run before the guarded call. Hooks run in
    /// registration order.
    pub fn before_hook(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.before.push(Box::new(hook));
        self
    }

    /// Registers a hook to run after a successful guarded call. Hooks run in
    /// registration order.
    pub fn after_hook(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.after.push(Box::new(hook));
        self
    }

    /// Puts a token-bucket gate ahead of the pipeline: calls rejected by the
    /// gate fail with [`MeshError::LimitExceeded`] before any hook or breaker
    /// runs.
    pub fn rate_gate(mut self, gate: Arc<TokenGate>) -> Self {
        self.before.insert(0, Box::new(move || gate.try_acquire()));
        self
    }

    /// Delivers one call.
    ///
    /// `span` carries the caller's tracing context; when absent a client span
    /// is opened from the configured collector settings. `deadline` bounds the
    /// remote exchange and propagates to the peer.
    pub async fn invoke(
        &self,
        path: &str,
        command: &str,
        span: Option<Span>,
        deadline: Option<Duration>,
        args: RpcArgs,
    ) -> Result<RpcResult> {
        for hook in &self.before {
            hook()?;
        }

        let ctx = InvocationContext {
            path: path.to_string(),
            deadline,
            span: span.unwrap_or_else(|| self.trace.client_span(path)),
        };

        let breaker = self.breakers.guard(command);
        let result = breaker.run(self.call_selected(&ctx, args)).await?;

        for hook in &self.after {
            hook()?;
        }

        Ok(result)
    }

    /// The guarded body: resolve, select, connect, call.
    async fn call_selected(&self, ctx: &InvocationContext, args: RpcArgs) -> Result<RpcResult> {
        let instances = self.cache.resolve(&self.service_name).await;
        if instances.is_empty() {
            return Err(MeshError::InstancesUnavailable);
        }

        let instance = self.load_balance.select(&instances)?;
        if !instance.has_rpc_endpoint() {
            return Err(MeshError::NoRpcEndpoint {
                host: instance.host,
                port: instance.port,
            });
        }

        let span = ctx.span.clone();
        async {
            tracing::debug!(
                host = %instance.host,
                rpc_port = instance.rpc_port,
                "selected instance"
            );
            let mut connection = self
                .transport
                .connect(&instance.host, instance.rpc_port as u16, self.connect_timeout)
                .await?;
            connection.invoke(&ctx.path, args, ctx.deadline).await
        }
        .instrument(span)
        .await
    }
}
