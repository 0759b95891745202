//! Active health probing of route replicas.
//!
//! One task per active health-checked route issues a GET against each
//! replica's `base_url + health_path` on the route's interval, outside any
//! circuit breaker. Health flips use consecutive-probe hysteresis: a replica
//! must fail `unhealthy_threshold` probes in a row to be marked unhealthy
//! and succeed `healthy_threshold` in a row to recover.

use crate::services::registry::RouteRegistry;
use crate::utils::path::build_upstream_url;
use ahash::HashMap as AHashMap;
use log::{debug, info, warn};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

pub struct HealthMonitor {
    registry: Arc<RouteRegistry>,
    client: Client,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .build()
            .expect("Failed to create health probe client");
        Self {
            registry,
            client,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns a probe task for every active route with health checking
    /// enabled.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap();
        for route in self.registry.list() {
            if !route.active || !route.health_check.enabled {
                continue;
            }
            let registry = self.registry.clone();
            let client = self.client.clone();
            let path = route.path.clone();
            let method = route.method.clone();
            handles.push(tokio::spawn(async move {
                probe_route(registry, client, path, method).await;
            }));
        }
        info!("health monitor running {} probe tasks", handles.len());
    }

    /// Cancels all probes and re-inspects the registry. Called after the
    /// route table changes through the admin surface.
    pub fn resync(&self) {
        self.shutdown();
        self.start();
    }

    /// Cancels all probe tasks; in-flight probes observe the abort and
    /// abandon their updates.
    pub fn shutdown(&self) {
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            handle.abort();
        }
    }

    pub fn probe_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

async fn probe_route(registry: Arc<RouteRegistry>, client: Client, path: String, method: String) {
    // Consecutive (successes, failures) per replica URL.
    let mut streaks: AHashMap<String, (u32, u32)> = AHashMap::default();

    loop {
        // Re-read the route each tick so policy changes and deletions are
        // observed without restarting the task.
        let Some(route) = registry.get(&path, &method) else {
            debug!("probe task for {} {} exiting: route gone", method, path);
            return;
        };
        if !route.active || !route.health_check.enabled {
            debug!("probe task for {} {} exiting: checks disabled", method, path);
            return;
        }
        let check = route.health_check.clone();

        for target in &route.targets {
            let url = build_upstream_url(&target.url, &check.path, None);
            let started = Instant::now();
            let outcome = timeout(
                Duration::from_millis(check.timeout_ms),
                client.get(&url).send(),
            )
            .await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let success = matches!(&outcome, Ok(Ok(resp)) if resp.status().is_success());

            let streak = streaks.entry(target.url.clone()).or_insert((0, 0));
            if success {
                streak.0 += 1;
                streak.1 = 0;
                registry.record_replica_result(&path, &method, &target.url, true);
                registry.update_replica_latency(&path, &method, &target.url, latency_ms);
                if !target.healthy && streak.0 >= check.healthy_threshold {
                    registry.update_replica_health(&path, &method, &target.url, true);
                    info!("replica recovered: {} ({} {})", target.url, method, path);
                }
            } else {
                streak.0 = 0;
                streak.1 += 1;
                registry.record_replica_result(&path, &method, &target.url, false);
                if target.healthy && streak.1 >= check.unhealthy_threshold {
                    registry.update_replica_health(&path, &method, &target.url, false);
                    warn!("replica degraded: {} ({} {})", target.url, method, path);
                }
            }
        }

        sleep(Duration::from_millis(route.health_check.interval_ms)).await;
    }
}
