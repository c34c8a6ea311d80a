use crate::registry::{RawInstance, RPC_PORT_META_KEY};

/// Identity of an instance: the (host, primary port) pair.
///
/// Anything else about an instance may change between cache refreshes; the
/// identity is what load-balancer state is keyed by.
pub type InstanceId = (String, u16);

/// One network-addressable endpoint backing a logical service name.
///
/// Instances are value-like: every cache refresh replaces them wholesale,
/// they are never patched in place. The weighted balancer's running
/// accumulator therefore lives outside this type, keyed by [`InstanceId`]
/// (see the client crate), so a refreshed instance never aliases stale
/// selection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Host address.
    pub host: String,
    /// Primary port, used for health and transport metadata.
    pub port: u16,
    /// Statically configured load weight.
    pub weight: u32,
    /// RPC port; zero or negative means the instance has no RPC capability.
    pub rpc_port: i32,
}

impl ServiceInstance {
    /// Creates an instance with the default weight of 1 and the conventional
    /// RPC port of `port - 1`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: 1,
            rpc_port: i32::from(port) - 1,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rpc_port(mut self, rpc_port: i32) -> Self {
        self.rpc_port = rpc_port;
        self
    }

    /// Builds an instance from raw registry metadata.
    ///
    /// The RPC port defaults to `port - 1` unless the instance's metadata
    /// carries an explicit override under [`RPC_PORT_META_KEY`]; the weight is
    /// the registry's reported passing-weight.
    pub fn from_raw(raw: &RawInstance) -> Self {
        let rpc_port = raw
            .metadata
            .get(RPC_PORT_META_KEY)
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or_else(|| i32::from(raw.port) - 1);

        Self {
            host: raw.host.clone(),
            port: raw.port,
            weight: raw.passing_weight,
            rpc_port,
        }
    }

    pub fn id(&self) -> InstanceId {
        (self.host.clone(), self.port)
    }

    /// Whether this instance can take an RPC-capable call at all.
    pub fn has_rpc_endpoint(&self) -> bool {
        self.rpc_port > 0
    }
}
