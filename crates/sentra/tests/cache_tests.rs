use sentra::models::error::GatewayError;
use sentra::services::cache::{CachedResponse, ResponseCache, DEFAULT_MAX_BYTES};
use std::time::Duration;
use tokio::time::sleep;

fn response(body: &str) -> CachedResponse {
    CachedResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "text/plain".to_string())],
        body: body.as_bytes().to_vec(),
    }
}

fn cache(max_entries: usize, max_bytes: usize) -> ResponseCache {
    ResponseCache::new(max_entries, max_bytes, Duration::from_secs(60))
}

#[test]
fn set_get_has_delete_clear() {
    let cache = cache(10, DEFAULT_MAX_BYTES);
    cache.set("k", response("hello"), None);

    assert!(cache.has("k"));
    assert_eq!(cache.get("k").unwrap().body, b"hello");

    assert!(cache.delete("k"));
    assert!(!cache.delete("k"));
    assert!(cache.get("k").is_none());

    cache.set("a", response("a"), None);
    cache.set("b", response("b"), None);
    cache.clear();
    assert_eq!(cache.stats().entries, 0);
    assert_eq!(cache.stats().bytes, 0);
}

#[tokio::test]
async fn entries_are_never_served_past_expiry() {
    let cache = cache(10, DEFAULT_MAX_BYTES);
    cache.set("k", response("soon gone"), Some(Duration::from_millis(50)));

    assert!(cache.get("k").is_some());
    sleep(Duration::from_millis(80)).await;
    assert!(cache.get("k").is_none());
    assert!(!cache.has("k"));
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test]
async fn sweep_collects_expired_entries() {
    let cache = cache(10, DEFAULT_MAX_BYTES);
    cache.set("a", response("a"), Some(Duration::from_millis(40)));
    cache.set("b", response("b"), Some(Duration::from_secs(60)));

    sleep(Duration::from_millis(70)).await;
    assert_eq!(cache.sweep_expired(), 1);
    assert!(cache.has("b"));
}

#[test]
fn entry_count_never_exceeds_bound() {
    let cache = cache(3, DEFAULT_MAX_BYTES);
    for i in 0..10 {
        cache.set(&format!("k{}", i), response("x"), None);
        assert!(cache.stats().entries <= 3);
    }
    assert_eq!(cache.stats().evictions, 7);
}

#[test]
fn byte_budget_evicts_least_recent() {
    // Each entry is roughly key + body + headers + overhead; 3 fit, not 4.
    let body = "x".repeat(200);
    let cache = ResponseCache::new(100, 900, Duration::from_secs(60));

    cache.set("a", response(&body), None);
    cache.set("b", response(&body), None);
    cache.set("c", response(&body), None);
    cache.get("a");
    cache.get("c");

    cache.set("d", response(&body), None);
    let stats = cache.stats();
    assert!(stats.bytes <= 900);
    assert!(!cache.has("b"));
    assert!(cache.has("a"));
    assert!(cache.has("d"));
}

#[test]
fn oversized_values_are_not_stored() {
    let cache = ResponseCache::new(10, 128, Duration::from_secs(60));
    cache.set("big", response(&"x".repeat(1_000)), None);
    assert!(!cache.has("big"));
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn personalized_entries_do_not_cross_principals() {
    let cache = cache(10, DEFAULT_MAX_BYTES);
    let key_alice = ResponseCache::http_key("GET", "/api/me", Some("Bearer alice-token"));
    let key_bob = ResponseCache::http_key("GET", "/api/me", Some("Bearer bob-token"));
    assert_ne!(key_alice, key_bob);

    cache.set(&key_alice, response("alice data"), None);
    assert!(cache.get(&key_bob).is_none());
    assert_eq!(cache.get(&key_alice).unwrap().body, b"alice data");
}

#[tokio::test]
async fn get_or_set_runs_the_producer_once() {
    let cache = cache(10, DEFAULT_MAX_BYTES);

    let produced = cache
        .get_or_set("k", None, || async { Ok(response("fresh")) })
        .await
        .unwrap();
    assert_eq!(produced.body, b"fresh");

    // Second call must be served from the store, not the producer.
    let cached = cache
        .get_or_set("k", None, || async {
            Err::<CachedResponse, _>(GatewayError::internal("producer must not run"))
        })
        .await
        .unwrap();
    assert_eq!(cached.body, b"fresh");
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn hit_and_miss_accounting() {
    let cache = cache(10, DEFAULT_MAX_BYTES);
    cache.set("k", response("v"), None);

    cache.get("k");
    cache.get("k");
    cache.get("absent");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}
