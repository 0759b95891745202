//! Bounded in-memory response cache with TTL and LRU eviction.
//!
//! The store enforces two limits, a maximum entry count and a maximum total
//! byte size; inserting past either evicts least-recently-accessed entries
//! until both hold again. Expired entries are dropped at read time and by
//! the periodic sweep.

use crate::models::error::GatewayError;
use ahash::HashMap as AHashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default total byte budget for the cache.
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// A stored upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedResponse,
    expires_at: Instant,
    access_count: u64,
    last_access: u64,
    size_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub max_entries: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: AHashMap<String, CacheEntry>,
    bytes: usize,
    access_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

pub struct ResponseCache {
    state: Mutex<CacheState>,
    max_entries: usize,
    max_bytes: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, max_bytes: usize, default_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries,
            max_bytes,
            default_ttl,
        }
    }

    /// Looks up a non-expired entry, bumping its access recency.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => {
                state.misses += 1;
                return None;
            }
        };

        if expired {
            if let Some(old) = state.entries.remove(key) {
                state.bytes -= old.size_bytes;
            }
            state.expirations += 1;
            state.misses += 1;
            return None;
        }

        state.access_seq += 1;
        state.hits += 1;
        let seq = state.access_seq;
        let entry = state.entries.get_mut(key)?;
        entry.last_access = seq;
        entry.access_count += 1;
        Some(entry.value.clone())
    }

    /// True when a live entry exists. Does not touch recency.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(key)
            .map(|e| e.expires_at > now)
            .unwrap_or(false)
    }

    /// Inserts or replaces an entry. `ttl` overrides the default TTL.
    pub fn set(&self, key: &str, value: CachedResponse, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let size_bytes = Self::estimate_size(key, &value);
        if size_bytes > self.max_bytes {
            // Would never fit, not even alone.
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.access_seq += 1;
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
            access_count: 0,
            last_access: state.access_seq,
            size_bytes,
        };
        if let Some(old) = state.entries.insert(key.to_string(), entry) {
            state.bytes -= old.size_bytes;
        }
        state.bytes += size_bytes;

        while state.entries.len() > self.max_entries || state.bytes > self.max_bytes {
            let Some(victim) = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(old) = state.entries.remove(&victim) {
                state.bytes -= old.size_bytes;
                state.evictions += 1;
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.entries.remove(key) {
            Some(old) => {
                state.bytes -= old.size_bytes;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.bytes = 0;
    }

    /// Returns the cached value for `key`, producing and storing it on miss.
    pub async fn get_or_set<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<CachedResponse, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedResponse, GatewayError>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = producer().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drops expired entries. Returns the removed count.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            if let Some(old) = state.entries.remove(key) {
                state.bytes -= old.size_bytes;
                state.expirations += 1;
            }
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        CacheStats {
            entries: state.entries.len(),
            bytes: state.bytes,
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }

    fn estimate_size(key: &str, value: &CachedResponse) -> usize {
        let headers: usize = value
            .headers
            .iter()
            .map(|(name, val)| name.len() + val.len())
            .sum();
        key.len() + value.body.len() + headers + 64
    }

    /// Builds the cache key for an HTTP request.
    ///
    /// Authenticated requests get a user discriminator derived from the
    /// authorization header (or an explicit user id header) so personalized
    /// responses never leak across principals.
    pub fn http_key(method: &str, url: &str, user_token: Option<&str>) -> String {
        let mut key = format!("http:{}:{}", method, url);
        if let Some(token) = user_token {
            let digest = Sha256::digest(token.as_bytes());
            key.push_str(":user:");
            key.push_str(&hex::encode(digest)[..16]);
        }
        key
    }

    /// HTTP caching contract: only 2xx responses without `no-cache`/
    /// `no-store` directives and without `Set-Cookie` are stored.
    pub fn should_cache_response(status: u16, headers: &[(String, String)]) -> bool {
        if !(200..300).contains(&status) {
            return false;
        }
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("set-cookie") {
                return false;
            }
            if name.eq_ignore_ascii_case("cache-control") {
                let value = value.to_ascii_lowercase();
                if value.contains("no-cache") || value.contains("no-store") {
                    return false;
                }
            }
        }
        true
    }

    /// TTL derived from response headers: `max-age`, else a future
    /// `Expires`, else `None` (the default TTL applies).
    pub fn ttl_from_headers(headers: &[(String, String)]) -> Option<Duration> {
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("cache-control") {
                for directive in value.split(',') {
                    let directive = directive.trim().to_ascii_lowercase();
                    if let Some(raw) = directive.strip_prefix("max-age=") {
                        if let Ok(secs) = raw.trim().parse::<u64>() {
                            return Some(Duration::from_secs(secs));
                        }
                    }
                }
            }
        }
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("expires") {
                if let Ok(expires) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
                    let delta = expires.with_timezone(&chrono::Utc) - chrono::Utc::now();
                    if let Ok(std_delta) = delta.to_std() {
                        if !std_delta.is_zero() {
                            return Some(std_delta);
                        }
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn http_key_discriminates_users() {
        let anonymous = ResponseCache::http_key("GET", "/api/x", None);
        let alice = ResponseCache::http_key("GET", "/api/x", Some("Bearer aaa"));
        let bob = ResponseCache::http_key("GET", "/api/x", Some("Bearer bbb"));
        assert_ne!(anonymous, alice);
        assert_ne!(alice, bob);
    }

    #[test]
    fn caching_contract() {
        let plain = vec![("content-type".to_string(), "text/plain".to_string())];
        assert!(ResponseCache::should_cache_response(200, &plain));
        assert!(!ResponseCache::should_cache_response(404, &plain));
        assert!(!ResponseCache::should_cache_response(500, &plain));

        let no_store = vec![("Cache-Control".to_string(), "no-store".to_string())];
        assert!(!ResponseCache::should_cache_response(200, &no_store));

        let cookie = vec![("Set-Cookie".to_string(), "sid=1".to_string())];
        assert!(!ResponseCache::should_cache_response(200, &cookie));
    }

    #[test]
    fn ttl_prefers_max_age() {
        let headers = vec![(
            "Cache-Control".to_string(),
            "public, max-age=120".to_string(),
        )];
        assert_eq!(
            ResponseCache::ttl_from_headers(&headers),
            Some(Duration::from_secs(120))
        );
        assert_eq!(ResponseCache::ttl_from_headers(&[]), None);
    }

    #[test]
    fn entry_count_bound_evicts_lru() {
        let cache = ResponseCache::new(2, DEFAULT_MAX_BYTES, Duration::from_secs(60));
        cache.set("a", response("a"), None);
        cache.set("b", response("b"), None);
        // Touch "a" so "b" becomes the eviction victim.
        cache.get("a");
        cache.set("c", response("c"), None);
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evictions, 1);
    }
}
