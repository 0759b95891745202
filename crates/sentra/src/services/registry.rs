//! Route registry: owns route definitions and replica health state.
//!
//! Routes are keyed by (method, path) and mutable at runtime through the
//! admin surface. Readers obtain cloned snapshots sufficient to complete a
//! dispatch; later mutations do not retroactively affect an in-flight
//! request.

use crate::models::error::GatewayError;
use crate::models::route::{Replica, Route, RouteConfig};
use crate::utils::pattern;
use ahash::HashMap as AHashMap;
use chrono::Utc;
use log::info;
use serde::Serialize;
use std::sync::RwLock;

fn route_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_uppercase(), path)
}

/// Per-route replica health snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct RouteHealth {
    pub route: String,
    pub targets: Vec<Replica>,
    pub healthy: usize,
    pub total: usize,
}

pub struct RouteRegistry {
    routes: RwLock<AHashMap<String, Route>>,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(AHashMap::default()),
        }
    }

    /// Registry pre-loaded with the demo routes (`GET /api/users`,
    /// `GET /api/orders`), which aid end-to-end testing and can be removed
    /// through the admin surface.
    pub fn with_demo_routes() -> Self {
        let registry = Self::new();
        let demo = [
            RouteConfig {
                path: "/api/users".to_string(),
                method: "GET".to_string(),
                targets: vec![
                    Replica::new("http://127.0.0.1:8081"),
                    Replica::new("http://127.0.0.1:8082"),
                ],
                load_balancer: Default::default(),
                health_check: Default::default(),
                circuit_breaker: Default::default(),
                timeout_ms: 30_000,
                retries: 1,
                active: true,
                public: true,
                required_roles: vec![],
                required_permissions: vec![],
                auth_logic: Default::default(),
            },
            RouteConfig {
                path: "/api/orders".to_string(),
                method: "GET".to_string(),
                targets: vec![Replica::new("http://127.0.0.1:8083")],
                load_balancer: Default::default(),
                health_check: Default::default(),
                circuit_breaker: Default::default(),
                timeout_ms: 30_000,
                retries: 1,
                active: true,
                public: true,
                required_roles: vec![],
                required_permissions: vec![],
                auth_logic: Default::default(),
            },
        ];
        for config in demo {
            // Demo definitions are static and valid by construction.
            let _ = registry.put(config);
        }
        registry
    }

    pub fn get(&self, path: &str, method: &str) -> Option<Route> {
        self.routes
            .read()
            .unwrap()
            .get(&route_key(method, path))
            .cloned()
    }

    pub fn list(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.routes.read().unwrap().values().cloned().collect();
        routes.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        routes
    }

    /// Creates or replaces the route keyed by (method, path), assigning a
    /// fresh id and timestamps.
    pub fn put(&self, config: RouteConfig) -> Result<Route, GatewayError> {
        config
            .validate()
            .map_err(GatewayError::bad_request)?;
        let route = Route::from_config(config);
        let key = route_key(&route.method, &route.path);
        let replaced = self
            .routes
            .write()
            .unwrap()
            .insert(key, route.clone())
            .is_some();
        info!(
            "route {} {} {}",
            route.method,
            route.path,
            if replaced { "replaced" } else { "registered" }
        );
        Ok(route)
    }

    pub fn delete(&self, path: &str, method: &str) -> bool {
        let removed = self
            .routes
            .write()
            .unwrap()
            .remove(&route_key(method, path))
            .is_some();
        if removed {
            info!("route {} {} deleted", method.to_uppercase(), path);
        }
        removed
    }

    /// Matches a request against the registered routes.
    ///
    /// Exact (method, path) wins outright. Otherwise active pattern routes
    /// of the same method are scanned; the longest literal prefix wins,
    /// tie-broken by fewer placeholder segments and then by path order so
    /// the result is stable for a given registry state.
    pub fn find_match(&self, request_path: &str, method: &str) -> Option<Route> {
        let routes = self.routes.read().unwrap();

        if let Some(route) = routes.get(&route_key(method, request_path)) {
            if route.active {
                return Some(route.clone());
            }
        }

        let method = method.to_uppercase();
        let mut best: Option<&Route> = None;
        let mut best_rank: (usize, usize, &str) = (0, usize::MAX, "");
        for route in routes.values() {
            if !route.active || route.method != method || !pattern::is_pattern(&route.path) {
                continue;
            }
            if !pattern::matches(&route.path, request_path) {
                continue;
            }
            let rank = (
                pattern::literal_prefix_len(&route.path),
                pattern::placeholder_count(&route.path),
                route.path.as_str(),
            );
            let better = match best {
                None => true,
                Some(_) => {
                    rank.0 > best_rank.0
                        || (rank.0 == best_rank.0
                            && (rank.1 < best_rank.1
                                || (rank.1 == best_rank.1 && rank.2 < best_rank.2)))
                }
            };
            if better {
                best = Some(route);
                best_rank = rank;
            }
        }
        best.cloned()
    }

    /// Only healthy replicas are ever handed to a load balancer.
    pub fn healthy_replicas(&self, path: &str, method: &str) -> Vec<Replica> {
        self.get(path, method)
            .map(|route| route.healthy_targets())
            .unwrap_or_default()
    }

    /// Flips a replica's health flag, stamping the check time.
    pub fn update_replica_health(&self, path: &str, method: &str, url: &str, healthy: bool) -> bool {
        let mut routes = self.routes.write().unwrap();
        let Some(route) = routes.get_mut(&route_key(method, path)) else {
            return false;
        };
        for target in route.targets.iter_mut() {
            if target.url == url {
                target.healthy = healthy;
                target.last_check = Some(Utc::now());
                return true;
            }
        }
        false
    }

    /// Records a probe or forward outcome against a replica's error
    /// counters: successes decrement the consecutive count (floor 0),
    /// failures increment it and the lifetime total.
    pub fn record_replica_result(&self, path: &str, method: &str, url: &str, success: bool) -> bool {
        let mut routes = self.routes.write().unwrap();
        let Some(route) = routes.get_mut(&route_key(method, path)) else {
            return false;
        };
        for target in route.targets.iter_mut() {
            if target.url == url {
                target.last_check = Some(Utc::now());
                if success {
                    target.error_count = target.error_count.saturating_sub(1);
                } else {
                    target.error_count += 1;
                    target.total_errors += 1;
                }
                return true;
            }
        }
        false
    }

    pub fn update_replica_latency(&self, path: &str, method: &str, url: &str, ms: u64) -> bool {
        let mut routes = self.routes.write().unwrap();
        let Some(route) = routes.get_mut(&route_key(method, path)) else {
            return false;
        };
        for target in route.targets.iter_mut() {
            if target.url == url {
                target.response_time_ms = Some(ms);
                return true;
            }
        }
        false
    }

    /// Replica health snapshot for the admin stats surface.
    pub fn health_snapshot(&self) -> Vec<RouteHealth> {
        self.list()
            .into_iter()
            .map(|route| RouteHealth {
                route: route.key(),
                healthy: route.targets.iter().filter(|t| t.healthy).count(),
                total: route.targets.len(),
                targets: route.targets,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
