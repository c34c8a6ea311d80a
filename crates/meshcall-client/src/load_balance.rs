//! Load-balancing policies.
//!
//! A policy picks one instance out of a candidate list. Policies are
//! interchangeable behind the [`LoadBalance`] trait; the pipeline takes an
//! `Arc<dyn LoadBalance>` by constructor injection, so there is no process-wide
//! default to reach for.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;

use meshcall_common::protocol::{MeshError, Result};
use meshcall_discover::{InstanceId, ServiceInstance};

/// Selection policy over a candidate instance list.
///
/// `select` fails with [`MeshError::InstancesUnavailable`] when the candidate
/// list is empty; for a non-empty list it always returns one of the inputs.
pub trait LoadBalance: Send + Sync {
    fn select(&self, instances: &[ServiceInstance]) -> Result<ServiceInstance>;
}

/// Uniform random selection.
///
/// O(1), no shared mutable state, safe for unlimited concurrent callers.
#[derive(Default)]
pub struct RandomLoadBalance;

impl RandomLoadBalance {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalance for RandomLoadBalance {
    fn select(&self, instances: &[ServiceInstance]) -> Result<ServiceInstance> {
        if instances.is_empty() {
            return Err(MeshError::InstancesUnavailable);
        }
        let index = rand::rng().random_range(0..instances.len());
        Ok(instances[index].clone())
    }
}

/// Smooth weighted round-robin.
///
/// Each selection adds every candidate's static weight to its running
/// accumulator, picks the candidate with the largest accumulator (ties go to
/// the first encountered, so a fixed input order is deterministic), then
/// subtracts the total static weight from the winner. Over many calls the
/// pick distribution is proportional to static weight without bursting on a
/// single instance.
///
/// The accumulators are owned by the balancer, keyed by instance identity;
/// they are never stored on the instance values, which are replaced wholesale
/// on every cache refresh. The whole selection (read, winner mutation, total
/// subtraction) is one critical section under the balancer's own lock, so
/// concurrent callers never select against an inconsistent weight snapshot.
#[derive(Default)]
pub struct WeightedRoundRobinLoadBalance {
    current: Mutex<HashMap<InstanceId, i64>>,
}

impl WeightedRoundRobinLoadBalance {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalance for WeightedRoundRobinLoadBalance {
    fn select(&self, instances: &[ServiceInstance]) -> Result<ServiceInstance> {
        if instances.is_empty() {
            return Err(MeshError::InstancesUnavailable);
        }

        let mut current = self.current.lock();

        // Drop accumulators for instances no longer in the candidate set, so
        // state from before a cache refresh never leaks into this one.
        current.retain(|id, _| {
            instances
                .iter()
                .any(|instance| instance.host == id.0 && instance.port == id.1)
        });

        let mut total: i64 = 0;
        let mut best: Option<usize> = None;
        let mut best_weight = i64::MIN;

        for (index, instance) in instances.iter().enumerate() {
            let accumulator = current.entry(instance.id()).or_insert(0);
            *accumulator += i64::from(instance.weight);
            total += i64::from(instance.weight);

            if *accumulator > best_weight {
                best_weight = *accumulator;
                best = Some(index);
            }
        }

        let Some(index) = best else {
            return Err(MeshError::InstancesUnavailable);
        };

        let winner = &instances[index];
        if let Some(accumulator) = current.get_mut(&winner.id()) {
            *accumulator -= total;
        }

        Ok(winner.clone())
    }
}
