use sentra::models::route::{LoadBalancerPolicy, Replica};
use sentra::services::load_balancer::LoadBalancer;

fn replica(url: &str, response_time_ms: Option<u64>, error_count: u32, healthy: bool) -> Replica {
    Replica {
        url: url.to_string(),
        weight: 1,
        healthy,
        last_check: None,
        response_time_ms,
        error_count,
        total_errors: error_count as u64,
    }
}

/// The three-replica fixture: (responseTime, errorCount, healthy).
fn fixture() -> Vec<Replica> {
    vec![
        replica("http://a", Some(100), 0, true),
        replica("http://b", Some(150), 1, true),
        replica("http://c", Some(200), 5, false),
    ]
}

fn healthy_only(replicas: &[Replica]) -> Vec<Replica> {
    replicas.iter().filter(|r| r.healthy).cloned().collect()
}

#[test]
fn least_response_time_picks_fastest() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());
    let chosen = balancer
        .select("r", LoadBalancerPolicy::LeastResponseTime, &healthy, None)
        .unwrap();
    assert_eq!(chosen.url, "http://a");
}

#[test]
fn health_based_picks_fewest_errors() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());
    let chosen = balancer
        .select("r", LoadBalancerPolicy::HealthBased, &healthy, None)
        .unwrap();
    assert_eq!(chosen.url, "http://a");
}

#[test]
fn round_robin_alternates_over_healthy_replicas() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());
    assert_eq!(healthy.len(), 2);

    let first = balancer
        .select("r", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    let second = balancer
        .select("r", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    let third = balancer
        .select("r", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();

    assert_ne!(first.url, second.url);
    assert_eq!(first.url, third.url);
}

#[test]
fn round_robin_counters_are_per_route() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());

    let a = balancer
        .select("route-1", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    let b = balancer
        .select("route-2", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    // Each route starts its own cursor at the same position.
    assert_eq!(a.url, b.url);
}

#[test]
fn weighted_round_robin_follows_weights() {
    let balancer = LoadBalancer::new();
    let replicas = vec![
        Replica::new("http://heavy").with_weight(3),
        Replica::new("http://light").with_weight(1),
    ];

    let mut heavy = 0;
    let mut light = 0;
    for _ in 0..8 {
        let chosen = balancer
            .select("r", LoadBalancerPolicy::WeightedRoundRobin, &replicas, None)
            .unwrap();
        match chosen.url.as_str() {
            "http://heavy" => heavy += 1,
            _ => light += 1,
        }
    }
    assert_eq!(heavy, 6);
    assert_eq!(light, 2);
}

#[test]
fn least_connections_tracks_inflight() {
    let balancer = LoadBalancer::new();
    let replicas = vec![replica("http://a", None, 0, true), replica("http://b", None, 0, true)];

    balancer.incr_inflight("http://a");
    balancer.incr_inflight("http://a");
    balancer.incr_inflight("http://b");

    let chosen = balancer
        .select("r", LoadBalancerPolicy::LeastConnections, &replicas, None)
        .unwrap();
    assert_eq!(chosen.url, "http://b");

    balancer.decr_inflight("http://a");
    balancer.decr_inflight("http://a");
    let chosen = balancer
        .select("r", LoadBalancerPolicy::LeastConnections, &replicas, None)
        .unwrap();
    assert_eq!(chosen.url, "http://a");
    assert_eq!(balancer.inflight_count("http://a"), 0);
}

#[test]
fn decrement_saturates_at_zero() {
    let balancer = LoadBalancer::new();
    balancer.incr_inflight("http://a");
    balancer.decr_inflight("http://a");
    balancer.decr_inflight("http://a");
    assert_eq!(balancer.inflight_count("http://a"), 0);
}

#[test]
fn random_stays_within_the_input() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());
    for _ in 0..20 {
        let chosen = balancer
            .select("r", LoadBalancerPolicy::Random, &healthy, None)
            .unwrap();
        assert!(healthy.iter().any(|r| r.url == chosen.url));
    }
}

#[test]
fn empty_input_returns_none() {
    let balancer = LoadBalancer::new();
    for policy in [
        LoadBalancerPolicy::RoundRobin,
        LoadBalancerPolicy::WeightedRoundRobin,
        LoadBalancerPolicy::LeastConnections,
        LoadBalancerPolicy::LeastResponseTime,
        LoadBalancerPolicy::HealthBased,
        LoadBalancerPolicy::Random,
    ] {
        assert!(balancer.select("r", policy, &[], None).is_none());
    }
}

#[test]
fn reset_clears_counters() {
    let balancer = LoadBalancer::new();
    let healthy = healthy_only(&fixture());

    let first = balancer
        .select("r", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    balancer.incr_inflight("http://a");
    balancer.reset();

    assert_eq!(balancer.inflight_count("http://a"), 0);
    let after_reset = balancer
        .select("r", LoadBalancerPolicy::RoundRobin, &healthy, None)
        .unwrap();
    assert_eq!(first.url, after_reset.url);
}
