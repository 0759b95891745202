//! Replica selection policies.
//!
//! The balancer only ever sees the already-filtered healthy replica list; it
//! mutates nothing but its own counters (per-route round-robin cursors and
//! per-replica in-flight gauges, the latter maintained by the pipeline
//! around each forward).

use crate::models::route::{LoadBalancerPolicy, Replica};
use ahash::HashMap as AHashMap;
use rand::Rng;
use serde_json::json;
use std::sync::Mutex;

pub struct LoadBalancer {
    /// Per-route selection cursor (round-robin and weighted-round-robin).
    cursors: Mutex<AHashMap<String, u64>>,
    /// Outstanding in-flight forwardings per replica URL.
    inflight: Mutex<AHashMap<String, u64>>,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self {
            cursors: Mutex::new(AHashMap::default()),
            inflight: Mutex::new(AHashMap::default()),
        }
    }

    /// Selects a replica for the route under the given policy.
    ///
    /// `_session_id` is reserved for sticky sessions and unused by the
    /// current policies. Returns `None` on an empty input.
    pub fn select(
        &self,
        route_key: &str,
        policy: LoadBalancerPolicy,
        replicas: &[Replica],
        _session_id: Option<&str>,
    ) -> Option<Replica> {
        if replicas.is_empty() {
            return None;
        }

        let index = match policy {
            LoadBalancerPolicy::RoundRobin => {
                (self.next_cursor(route_key) as usize) % replicas.len()
            }
            LoadBalancerPolicy::WeightedRoundRobin => {
                let total: u64 = replicas.iter().map(|r| r.weight as u64).sum();
                if total == 0 {
                    0
                } else {
                    let mut position = (self.next_cursor(route_key) % total) as i64;
                    let mut chosen = replicas.len() - 1;
                    for (i, replica) in replicas.iter().enumerate() {
                        position -= replica.weight as i64;
                        if position < 0 {
                            chosen = i;
                            break;
                        }
                    }
                    chosen
                }
            }
            LoadBalancerPolicy::LeastConnections => {
                let inflight = self.inflight.lock().unwrap();
                replicas
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, r)| inflight.get(&r.url).copied().unwrap_or(0))
                    .map(|(i, _)| i)?
            }
            LoadBalancerPolicy::LeastResponseTime => replicas
                .iter()
                .enumerate()
                .min_by_key(|(_, r)| r.response_time_ms.unwrap_or(u64::MAX))
                .map(|(i, _)| i)?,
            LoadBalancerPolicy::HealthBased => replicas
                .iter()
                .enumerate()
                .min_by_key(|(_, r)| r.error_count)
                .map(|(i, _)| i)?,
            LoadBalancerPolicy::Random => rand::thread_rng().gen_range(0..replicas.len()),
        };

        replicas.get(index).cloned()
    }

    fn next_cursor(&self, route_key: &str) -> u64 {
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry(route_key.to_string()).or_insert(0);
        let current = *cursor;
        *cursor = cursor.wrapping_add(1);
        current
    }

    pub fn incr_inflight(&self, url: &str) {
        let mut inflight = self.inflight.lock().unwrap();
        *inflight.entry(url.to_string()).or_insert(0) += 1;
    }

    pub fn decr_inflight(&self, url: &str) {
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(count) = inflight.get_mut(url) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn inflight_count(&self, url: &str) -> u64 {
        self.inflight
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> serde_json::Value {
        let cursors = self.cursors.lock().unwrap();
        let inflight = self.inflight.lock().unwrap();
        let mut cursor_list: Vec<_> = cursors.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let mut inflight_list: Vec<_> = inflight.iter().map(|(k, v)| (k.clone(), *v)).collect();
        cursor_list.sort();
        inflight_list.sort();
        json!({
            "cursors": cursor_list.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
            "inflight": inflight_list.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
        })
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.cursors.lock().unwrap().clear();
        self.inflight.lock().unwrap().clear();
    }
}
