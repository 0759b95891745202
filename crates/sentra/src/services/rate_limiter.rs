//! Fixed-window rate limiting keyed by templated rule scopes.
//!
//! Each rule owns a key template (`ip:{ip}`, `user:{user}`, `global`, ...)
//! that is filled in from the request to select a window. Windows are fixed:
//! once the counter reaches the limit, further requests are denied until the
//! reset time passes and a fresh window starts.

use ahash::HashMap as AHashMap;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Request attributes a rule template can reference.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    /// Authenticated subject id, when known.
    pub user_id: Option<String>,
    /// URL path only, no query string.
    pub path: String,
    pub method: String,
    pub user_agent: String,
}

pub type SkipPredicate = fn(&RequestMeta) -> bool;

/// A rate limit rule: window key template, limit and window size.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    /// Template with `{ip}`, `{user}`, `{path}`, `{method}`, `{user-agent}`
    /// placeholders. A rule whose placeholder has no value for a request
    /// (e.g. `{user}` on anonymous traffic) is skipped for that request.
    pub key_template: String,
    pub limit: u64,
    pub window_ms: i64,
    /// When set, the rule only applies to paths under this prefix.
    pub path_prefix: Option<String>,
    pub skip: Option<SkipPredicate>,
}

impl Rule {
    pub fn new(name: &str, key_template: &str, limit: u64, window_ms: i64) -> Self {
        Self {
            name: name.to_string(),
            key_template: key_template.to_string(),
            limit,
            window_ms,
            path_prefix: None,
            skip: None,
        }
    }

    pub fn for_path(mut self, prefix: &str) -> Self {
        self.path_prefix = Some(prefix.to_string());
        self
    }

    fn key_for(&self, meta: &RequestMeta) -> Option<String> {
        let mut key = self.key_template.clone();
        if key.contains("{ip}") {
            key = key.replace("{ip}", &meta.ip);
        }
        if key.contains("{user}") {
            match &meta.user_id {
                Some(user) => key = key.replace("{user}", user),
                None => return None,
            }
        }
        if key.contains("{path}") {
            key = key.replace("{path}", &meta.path);
        }
        if key.contains("{method}") {
            key = key.replace("{method}", &meta.method);
        }
        if key.contains("{user-agent}") {
            key = key.replace("{user-agent}", &meta.user_agent);
        }
        Some(key)
    }
}

#[derive(Debug, Clone)]
struct Window {
    count: u64,
    started_at: DateTime<Utc>,
    reset_at: DateTime<Utc>,
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub rule: String,
    pub limit: u64,
    pub total_hits: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    /// Seconds until the denying window resets; only set on denial.
    pub retry_after: Option<u64>,
}

impl Decision {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            rule: String::new(),
            limit: 0,
            total_hits: 0,
            remaining: 0,
            reset_at: Utc::now(),
            retry_after: None,
        }
    }

    /// True when some rule actually applied (limit headers are meaningful).
    pub fn limited(&self) -> bool {
        self.limit > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowStats {
    pub key: String,
    pub count: u64,
    pub started_at: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub rules: usize,
    pub active_windows: usize,
    pub windows: Vec<WindowStats>,
}

pub struct RateLimiter {
    rules: Vec<Rule>,
    windows: Mutex<AHashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            windows: Mutex::new(AHashMap::default()),
        }
    }

    /// The default rule set applied to gateway traffic: base limits for
    /// global, per-IP and per-user scopes plus endpoint-specific limits for
    /// the auth endpoints and the demo APIs.
    pub fn default_rules(global_limit: u64, window_secs: u64) -> Vec<Rule> {
        let minute = 60_000;
        let window_ms = (window_secs as i64).saturating_mul(1_000);
        vec![
            Rule::new("global", "global", global_limit, window_ms),
            Rule::new("per-ip", "ip:{ip}", 100, minute),
            Rule::new("per-user", "user:{user}", 200, minute),
            Rule::new("login", "endpoint:{method}:{path}", 5, 5 * minute)
                .for_path("/api/v1/auth/login"),
            Rule::new("register", "endpoint:{method}:{path}", 3, 5 * minute)
                .for_path("/api/v1/auth/register"),
            Rule::new("users-api", "endpoint:{method}:{path}", 50, minute).for_path("/api/users"),
            Rule::new("orders-api", "endpoint:{method}:{path}", 30, minute).for_path("/api/orders"),
        ]
    }

    /// Evaluates every applicable rule in order.
    ///
    /// The first denial wins; otherwise the reported state is the
    /// most-restrictive (minimum remaining) over the evaluated rules. A
    /// request is counted against at most one window per rule, and denied
    /// requests are not counted at all.
    pub fn check(&self, meta: &RequestMeta) -> Decision {
        let now = Utc::now();
        let mut most_restrictive: Option<Decision> = None;
        let mut windows = self.windows.lock().unwrap();

        for rule in &self.rules {
            if let Some(prefix) = &rule.path_prefix {
                if !meta.path.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if let Some(skip) = rule.skip {
                if skip(meta) {
                    continue;
                }
            }
            let Some(key) = rule.key_for(meta) else {
                continue;
            };

            let window = windows.entry(key).or_insert_with(|| Window {
                count: 0,
                started_at: now,
                reset_at: now + Duration::milliseconds(rule.window_ms),
            });
            if now >= window.reset_at {
                window.count = 0;
                window.started_at = now;
                window.reset_at = now + Duration::milliseconds(rule.window_ms);
            }

            if window.count >= rule.limit {
                let millis_left = (window.reset_at - now).num_milliseconds().max(0) as f64;
                return Decision {
                    allowed: false,
                    rule: rule.name.clone(),
                    limit: rule.limit,
                    total_hits: window.count,
                    remaining: 0,
                    reset_at: window.reset_at,
                    retry_after: Some((millis_left / 1_000.0).ceil() as u64),
                };
            }

            window.count += 1;
            let decision = Decision {
                allowed: true,
                rule: rule.name.clone(),
                limit: rule.limit,
                total_hits: window.count,
                remaining: rule.limit - window.count,
                reset_at: window.reset_at,
                retry_after: None,
            };
            most_restrictive = match most_restrictive.take() {
                Some(previous) if previous.remaining <= decision.remaining => Some(previous),
                _ => Some(decision),
            };
        }

        most_restrictive.unwrap_or_else(Decision::unlimited)
    }

    /// Drops windows whose reset time has passed. Returns the removed count.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut windows = self.windows.lock().unwrap();
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        before - windows.len()
    }

    /// Clears every window.
    pub fn reset(&self) {
        self.windows.lock().unwrap().clear();
    }

    /// Removes one window by its concrete key, e.g. `ip:1.2.3.4`.
    pub fn remove(&self, key: &str) -> bool {
        self.windows.lock().unwrap().remove(key).is_some()
    }

    pub fn stats(&self) -> RateLimitStats {
        let windows = self.windows.lock().unwrap();
        let mut snapshot: Vec<WindowStats> = windows
            .iter()
            .map(|(key, w)| WindowStats {
                key: key.clone(),
                count: w.count,
                started_at: w.started_at,
                reset_at: w.reset_at,
            })
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        RateLimitStats {
            rules: self.rules.len(),
            active_windows: snapshot.len(),
            windows: snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> RequestMeta {
        RequestMeta {
            ip: "1.2.3.4".to_string(),
            user_id: None,
            path: path.to_string(),
            method: "GET".to_string(),
            user_agent: "test".to_string(),
        }
    }

    #[test]
    fn template_substitution() {
        let rule = Rule::new("r", "endpoint:{method}:{path}", 1, 1_000);
        assert_eq!(
            rule.key_for(&meta("/api/x")).unwrap(),
            "endpoint:GET:/api/x"
        );
    }

    #[test]
    fn user_rule_skipped_for_anonymous() {
        let rule = Rule::new("r", "user:{user}", 1, 1_000);
        assert!(rule.key_for(&meta("/x")).is_none());
        let mut with_user = meta("/x");
        with_user.user_id = Some("u-1".to_string());
        assert_eq!(rule.key_for(&with_user).unwrap(), "user:u-1");
    }

    #[test]
    fn denial_is_not_counted() {
        let limiter = RateLimiter::new(vec![Rule::new("r", "ip:{ip}", 2, 60_000)]);
        let m = meta("/x");
        assert!(limiter.check(&m).allowed);
        assert!(limiter.check(&m).allowed);
        let denied = limiter.check(&m);
        assert!(!denied.allowed);
        assert_eq!(denied.total_hits, 2);
    }
}
