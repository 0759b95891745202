use sentra::models::principal::Role;
use sentra::models::route::{Replica, RouteConfig};
use sentra::services::registry::RouteRegistry;

fn config(method: &str, path: &str, targets: Vec<Replica>) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        method: method.to_string(),
        targets,
        load_balancer: Default::default(),
        health_check: Default::default(),
        circuit_breaker: Default::default(),
        timeout_ms: 30_000,
        retries: 0,
        active: true,
        public: true,
        required_roles: vec![],
        required_permissions: vec![],
        auth_logic: Default::default(),
    }
}

fn one_target() -> Vec<Replica> {
    vec![Replica::new("http://127.0.0.1:9000")]
}

#[test]
fn ships_with_demo_routes() {
    let registry = RouteRegistry::with_demo_routes();
    assert!(registry.get("/api/users", "GET").is_some());
    assert!(registry.get("/api/orders", "GET").is_some());
    assert_eq!(registry.len(), 2);
}

#[test]
fn put_get_delete_roundtrip() {
    let registry = RouteRegistry::new();
    let route = registry.put(config("GET", "/svc/things", one_target())).unwrap();
    assert!(!route.id.is_empty());
    assert_eq!(route.method, "GET");

    let fetched = registry.get("/svc/things", "GET").unwrap();
    assert_eq!(fetched.id, route.id);

    assert!(registry.delete("/svc/things", "GET"));
    assert!(!registry.delete("/svc/things", "GET"));
    assert!(registry.get("/svc/things", "GET").is_none());
}

#[test]
fn re_put_replaces_and_assigns_a_fresh_id() {
    let registry = RouteRegistry::new();
    let first = registry.put(config("GET", "/svc/things", one_target())).unwrap();
    let second = registry
        .put(config("get", "/svc/things", vec![Replica::new("http://127.0.0.1:9001")]))
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(registry.len(), 1);
    let current = registry.get("/svc/things", "GET").unwrap();
    assert_eq!(current.targets[0].url, "http://127.0.0.1:9001");
}

#[test]
fn invalid_configs_are_rejected() {
    let registry = RouteRegistry::new();
    assert!(registry.put(config("GET", "no-slash", one_target())).is_err());
    assert!(registry.put(config("SPLICE", "/x", one_target())).is_err());
    assert!(registry.put(config("GET", "/x", vec![])).is_err());
    assert!(registry
        .put(config("GET", "/x", vec![Replica::new("ftp://nope")]))
        .is_err());

    // A public route cannot also declare admission requirements.
    let mut contradictory = config("GET", "/x", one_target());
    contradictory.required_roles = vec![Role::Admin];
    assert!(registry.put(contradictory).is_err());
}

#[test]
fn exact_match_wins_over_patterns() {
    let registry = RouteRegistry::new();
    registry.put(config("GET", "/api/users/:id", one_target())).unwrap();
    registry.put(config("GET", "/api/users/list", one_target())).unwrap();

    let matched = registry.find_match("/api/users/list", "GET").unwrap();
    assert_eq!(matched.path, "/api/users/list");

    let matched = registry.find_match("/api/users/42", "GET").unwrap();
    assert_eq!(matched.path, "/api/users/:id");
}

#[test]
fn longer_literal_prefix_is_preferred() {
    let registry = RouteRegistry::new();
    registry.put(config("GET", "/api/:resource/*", one_target())).unwrap();
    registry.put(config("GET", "/api/users/:id", one_target())).unwrap();

    let matched = registry.find_match("/api/users/42", "GET").unwrap();
    assert_eq!(matched.path, "/api/users/:id");

    let matched = registry.find_match("/api/orders/42", "GET").unwrap();
    assert_eq!(matched.path, "/api/:resource/*");
}

#[test]
fn wildcard_matches_any_suffix() {
    let registry = RouteRegistry::new();
    registry.put(config("GET", "/files/*", one_target())).unwrap();

    assert!(registry.find_match("/files/a", "GET").is_some());
    assert!(registry.find_match("/files/a/b/c", "GET").is_some());
    assert!(registry.find_match("/other", "GET").is_none());
}

#[test]
fn method_must_match() {
    let registry = RouteRegistry::new();
    registry.put(config("POST", "/api/things", one_target())).unwrap();
    registry.put(config("POST", "/api/things/:id", one_target())).unwrap();

    assert!(registry.find_match("/api/things", "POST").is_some());
    assert!(registry.find_match("/api/things", "GET").is_none());
    assert!(registry.find_match("/api/things/7", "GET").is_none());
}

#[test]
fn inactive_routes_never_match() {
    let registry = RouteRegistry::new();
    let mut cfg = config("GET", "/api/things/:id", one_target());
    cfg.active = false;
    registry.put(cfg).unwrap();

    assert!(registry.find_match("/api/things/7", "GET").is_none());
}

#[test]
fn healthy_replicas_filters_unhealthy_targets() {
    let registry = RouteRegistry::new();
    registry
        .put(config(
            "GET",
            "/svc",
            vec![
                Replica::new("http://127.0.0.1:9000"),
                Replica::new("http://127.0.0.1:9001"),
            ],
        ))
        .unwrap();

    assert_eq!(registry.healthy_replicas("/svc", "GET").len(), 2);

    registry.update_replica_health("/svc", "GET", "http://127.0.0.1:9000", false);
    let healthy = registry.healthy_replicas("/svc", "GET");
    assert_eq!(healthy.len(), 1);
    assert_eq!(healthy[0].url, "http://127.0.0.1:9001");
    assert!(healthy.iter().all(|r| r.healthy));

    registry.update_replica_health("/svc", "GET", "http://127.0.0.1:9000", true);
    assert_eq!(registry.healthy_replicas("/svc", "GET").len(), 2);
}

#[test]
fn replica_result_counters() {
    let registry = RouteRegistry::new();
    registry.put(config("GET", "/svc", one_target())).unwrap();
    let url = "http://127.0.0.1:9000";

    registry.record_replica_result("/svc", "GET", url, false);
    registry.record_replica_result("/svc", "GET", url, false);
    let target = &registry.get("/svc", "GET").unwrap().targets[0];
    assert_eq!(target.error_count, 2);
    assert_eq!(target.total_errors, 2);
    assert!(target.last_check.is_some());

    registry.record_replica_result("/svc", "GET", url, true);
    registry.record_replica_result("/svc", "GET", url, true);
    registry.record_replica_result("/svc", "GET", url, true);
    let target = &registry.get("/svc", "GET").unwrap().targets[0];
    // Successes decrement with a floor of zero; lifetime errors remain.
    assert_eq!(target.error_count, 0);
    assert_eq!(target.total_errors, 2);
}

#[test]
fn latency_updates_are_recorded() {
    let registry = RouteRegistry::new();
    registry.put(config("GET", "/svc", one_target())).unwrap();

    assert!(registry.update_replica_latency("/svc", "GET", "http://127.0.0.1:9000", 42));
    assert!(!registry.update_replica_latency("/svc", "GET", "http://unknown", 42));
    assert_eq!(
        registry.get("/svc", "GET").unwrap().targets[0].response_time_ms,
        Some(42)
    );
}

#[test]
fn health_snapshot_reports_counts() {
    let registry = RouteRegistry::new();
    registry
        .put(config(
            "GET",
            "/svc",
            vec![
                Replica::new("http://127.0.0.1:9000"),
                Replica::new("http://127.0.0.1:9001"),
            ],
        ))
        .unwrap();
    registry.update_replica_health("/svc", "GET", "http://127.0.0.1:9001", false);

    let snapshot = registry.health_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].route, "GET /svc");
    assert_eq!(snapshot[0].healthy, 1);
    assert_eq!(snapshot[0].total, 2);
}
