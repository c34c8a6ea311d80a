use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use meshcall_client::circuit_breaker::BreakerConfig;
use meshcall_client::load_balance::WeightedRoundRobinLoadBalance;
use meshcall_client::pipeline::InvocationPipeline;
use meshcall_client::token_client::TokenClient;
use meshcall_common::protocol::{MeshError, Result};
use meshcall_common::rate_limit::{RateGateConfig, TokenGate};
use meshcall_common::transport::{Connection, TcpTransport, Transport};
use meshcall_discover::{
    InstanceCache, MemoryRegistry, RegistrationConfig, Registry, ServiceRegistration,
};

fn registration(
    id: &str,
    service: &str,
    host: &str,
    port: u16,
    weight: u32,
) -> ServiceRegistration {
    ServiceRegistration {
        instance_id: id.to_string(),
        service_name: service.to_string(),
        host: host.to_string(),
        port,
        health_check_url: "/health".to_string(),
        weight,
        metadata: HashMap::new(),
        tags: vec![],
        check: RegistrationConfig::default(),
    }
}

/// Transport double: records every connect and either fails or answers with a
/// canned value.
struct MockTransport {
    connects: Mutex<Vec<(String, u16)>>,
    response: Option<Value>,
}

impl MockTransport {
    fn answering(response: Value) -> Self {
        Self {
            connects: Mutex::new(Vec::new()),
            response: Some(response),
        }
    }

    fn refusing() -> Self {
        Self {
            connects: Mutex::new(Vec::new()),
            response: None,
        }
    }

    fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    fn connected_hosts(&self) -> Vec<String> {
        self.connects
            .lock()
            .unwrap()
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }
}

struct MockConnection {
    response: Value,
}

#[async_trait]
impl Connection for MockConnection {
    async fn invoke(
        &mut self,
        _path: &str,
        _args: Value,
        _deadline: Option<Duration>,
    ) -> Result<Value> {
        Ok(self.response.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>> {
        self.connects
            .lock()
            .unwrap()
            .push((host.to_string(), port));
        match &self.response {
            Some(response) => Ok(Box::new(MockConnection {
                response: response.clone(),
            })),
            None => Err(MeshError::Connection("refused".to_string())),
        }
    }
}

async fn cache_with(registrations: Vec<ServiceRegistration>) -> Arc<InstanceCache> {
    let registry = MemoryRegistry::new();
    for r in registrations {
        registry.register(r).await;
    }
    Arc::new(InstanceCache::new(Arc::new(registry)))
}

#[tokio::test]
async fn invoke_delivers_the_call_to_a_resolved_instance() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(json!({"left": 3})));
    let pipeline = InvocationPipeline::new("stock", cache, transport.clone());

    let result = pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({"sku": 7}))
        .await
        .unwrap();

    assert_eq!(result, json!({"left": 3}));
    // RPC port follows the port-minus-one convention.
    assert_eq!(
        transport.connects.lock().unwrap()[0],
        ("10.0.0.1".to_string(), 8000)
    );
}

#[tokio::test]
async fn empty_service_fails_unavailable_without_a_transport_call() {
    let cache = cache_with(vec![]).await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let pipeline = InvocationPipeline::new("oauth", cache, transport.clone());

    let err = pipeline
        .invoke("/oauth/check-token", "token_check", None, None, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::InstancesUnavailable));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test]
async fn instance_without_rpc_port_is_terminal_and_never_dialed() {
    let registry = MemoryRegistry::new();
    let mut r = registration("i1", "oauth", "10.0.0.1", 8001, 1);
    // Explicitly advertise "no RPC capability".
    r.metadata.insert("rpcPort".to_string(), "0".to_string());
    registry.register(r).await;
    let cache = Arc::new(InstanceCache::new(Arc::new(registry)));

    let transport = Arc::new(MockTransport::answering(json!({})));
    let pipeline = InvocationPipeline::new("oauth", cache, transport.clone());

    let err = pipeline
        .invoke("/oauth/check-token", "token_check", None, None, json!({}))
        .await
        .unwrap_err();

    match err {
        MeshError::NoRpcEndpoint { host, port } => {
            assert_eq!(host, "10.0.0.1");
            assert_eq!(port, 8001);
        }
        other => panic!("expected NoRpcEndpoint, got {other:?}"),
    }
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test]
async fn weighted_selection_five_to_one_across_invocations() {
    let cache = cache_with(vec![
        registration("a", "stock", "a", 8001, 5),
        registration("b", "stock", "b", 8002, 1),
    ])
    .await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let pipeline = InvocationPipeline::new("stock", cache, transport.clone())
        .with_load_balance(Arc::new(WeightedRoundRobinLoadBalance::new()));

    for _ in 0..6 {
        pipeline
            .invoke("/stock/query", "stock_query", None, None, json!({}))
            .await
            .unwrap();
    }

    let hosts = transport.connected_hosts();
    assert_eq!(hosts.iter().filter(|h| h.as_str() == "a").count(), 5);
    assert_eq!(hosts.iter().filter(|h| h.as_str() == "b").count(), 1);
    for pair in hosts.windows(2) {
        assert!(!(pair[0] == "b" && pair[1] == "b"));
    }
}

#[tokio::test]
async fn hooks_run_in_registration_order_around_the_call() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let (t1, t2, t3) = (trace.clone(), trace.clone(), trace.clone());
    let pipeline = InvocationPipeline::new("stock", cache, transport)
        .before_hook(move || {
            t1.lock().unwrap().push("before-1");
            Ok(())
        })
        .before_hook(move || {
            t2.lock().unwrap().push("before-2");
            Ok(())
        })
        .after_hook(move || {
            t3.lock().unwrap().push("after-1");
            Ok(())
        });

    pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({}))
        .await
        .unwrap();

    assert_eq!(
        *trace.lock().unwrap(),
        vec!["before-1", "before-2", "after-1"]
    );
}

#[tokio::test]
async fn failing_before_hook_aborts_before_anything_else() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let pipeline = InvocationPipeline::new("stock", cache, transport.clone())
        .before_hook(|| Err(MeshError::Hook("not authenticated".to_string())));

    let err = pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::Hook(_)));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test]
async fn failing_after_hook_surfaces_after_a_delivered_call() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let pipeline = InvocationPipeline::new("stock", cache, transport.clone())
        .after_hook(|| Err(MeshError::Hook("post-processing failed".to_string())));

    let err = pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::Hook(_)));
    // The call itself went out before the hook failed.
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test]
async fn transport_failures_open_the_breaker_and_stop_the_dialing() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::refusing());
    let pipeline = InvocationPipeline::new("stock", cache, transport.clone())
        .with_breaker_config(BreakerConfig {
            min_requests: 2,
            error_threshold: 0.5,
            sleep_window: Duration::from_secs(60),
            ..BreakerConfig::default()
        });

    for _ in 0..2 {
        let err = pipeline
            .invoke("/stock/query", "stock_query", None, None, json!({}))
            .await
            .unwrap_err();
        // The body's real error, not a breaker signal.
        assert!(matches!(err, MeshError::Connection(_)));
    }

    let err = pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::BreakerOpen(ref cmd) if cmd == "stock_query"));

    // Two real attempts, then the guard short-circuited.
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test]
async fn rate_gate_rejects_before_the_pipeline_runs() {
    let cache = cache_with(vec![registration("i1", "stock", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(json!({})));
    let gate = Arc::new(TokenGate::new(RateGateConfig {
        capacity: 2,
        refill_interval: Duration::from_secs(60),
    }));
    let pipeline =
        InvocationPipeline::new("stock", cache, transport.clone()).rate_gate(gate);

    for _ in 0..2 {
        pipeline
            .invoke("/stock/query", "stock_query", None, None, json!({}))
            .await
            .unwrap();
    }

    let err = pipeline
        .invoke("/stock/query", "stock_query", None, None, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::LimitExceeded));
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test]
async fn token_client_round_trips_typed_payloads() {
    let cache = cache_with(vec![registration("i1", "oauth", "10.0.0.1", 8001, 1)]).await;
    let transport = Arc::new(MockTransport::answering(
        json!({"valid": true, "user_name": "ada"}),
    ));
    let client = TokenClient::new(None, cache, transport, None);

    let response = client.check_token("secret", None).await.unwrap();
    assert!(response.valid);
    assert_eq!(response.user_name.as_deref(), Some("ada"));
}

/// Full stack: discovery, weighted selection and a real TCP exchange.
#[tokio::test]
async fn end_to_end_over_a_real_socket() {
    use meshcall_common::protocol::RpcResponse;
    use meshcall_common::transport::{tcp, JsonCodec};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                while let Ok(raw) = tcp::receive_message(&mut stream).await {
                    let request = JsonCodec::decode_request(&raw).unwrap();
                    let response =
                        RpcResponse::success(request.id, json!({"path": request.path}));
                    let encoded = JsonCodec::encode_response(&response).unwrap();
                    if tcp::send_message(&mut stream, &encoded).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    // Primary port is rpc_port + 1, so the port-minus-one convention lands
    // on the listener.
    let cache = cache_with(vec![registration(
        "i1",
        "echo",
        "127.0.0.1",
        rpc_port + 1,
        1,
    )])
    .await;
    let pipeline =
        InvocationPipeline::new("echo", cache, Arc::new(TcpTransport::new()));

    let result = pipeline
        .invoke("/echo/ping", "echo_ping", None, Some(Duration::from_secs(1)), json!({}))
        .await
        .unwrap();

    assert_eq!(result, json!({"path": "/echo/ping"}));
}
