//! Circuit breaking for upstream replicas.
//!
//! One breaker instance exists per (route id, replica URL), created lazily
//! on first use and garbage-collected after a period of inactivity. Failures
//! are kept as a sliding window of timestamps pruned by age; only
//! server-class failures (5xx, connect errors, timeouts) are recorded.

use crate::models::route::CircuitBreakerPolicy;
use ahash::HashMap as AHashMap;
use log::{info, warn};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State of one breaker instance.
///
/// * `Closed` - normal operation, requests pass through
/// * `Open` - failing fast until the retry time is reached
/// * `HalfOpen` - one probe request is allowed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    /// Sliding window of failure instants, pruned to `window_ms` on write.
    failures: Vec<Instant>,
    total: u64,
    success_count: u64,
    failure_count: u64,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    /// Earliest probe time while `Open`.
    next_attempt: Option<Instant>,
    last_activity: Instant,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: Vec::new(),
            total: 0,
            success_count: 0,
            failure_count: 0,
            last_failure: None,
            last_success: None,
            next_attempt: None,
            last_activity: Instant::now(),
        }
    }
}

/// Snapshot of one breaker for the admin stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub route_id: String,
    pub target: String,
    pub state: CircuitState,
    pub window_failures: usize,
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_failure_ms_ago: Option<u64>,
    pub last_success_ms_ago: Option<u64>,
    pub retry_in_ms: Option<u64>,
}

pub struct CircuitBreakerRegistry {
    entries: Mutex<AHashMap<(String, String), BreakerEntry>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(AHashMap::default()),
        }
    }

    /// Gate before forwarding to a replica.
    ///
    /// CLOSED and HALF_OPEN allow. OPEN denies until the retry time is
    /// reached, at which point the breaker moves to HALF_OPEN and the probe
    /// request is allowed through. A disabled config always allows and keeps
    /// no state.
    pub fn can_execute(
        &self,
        route_id: &str,
        target: &str,
        config: &CircuitBreakerPolicy,
    ) -> bool {
        if !config.enabled {
            return true;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry((route_id.to_string(), target.to_string()))
            .or_insert_with(BreakerEntry::new);
        entry.last_activity = now;

        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match entry.next_attempt {
                Some(at) if now >= at => {
                    entry.state = CircuitState::HalfOpen;
                    info!("circuit half-open for {} -> {}", route_id, target);
                    true
                }
                _ => false,
            },
        }
    }

    /// Records a server-class failure against (route, replica).
    pub fn record_failure(&self, route_id: &str, target: &str, config: &CircuitBreakerPolicy) {
        if !config.enabled {
            return;
        }
        let now = Instant::now();
        let window = Duration::from_millis(config.window_ms);
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry((route_id.to_string(), target.to_string()))
            .or_insert_with(BreakerEntry::new);
        entry.last_activity = now;
        entry.failures.retain(|t| now.duration_since(*t) <= window);
        entry.failures.push(now);
        entry.total += 1;
        entry.failure_count += 1;
        entry.last_failure = Some(now);

        match entry.state {
            CircuitState::Closed => {
                if entry.failures.len() as u32 >= config.threshold {
                    entry.state = CircuitState::Open;
                    entry.next_attempt = Some(now + timeout);
                    warn!(
                        "circuit opened for {} -> {} after {} failures",
                        route_id,
                        target,
                        entry.failures.len()
                    );
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.next_attempt = Some(now + timeout);
                warn!("circuit re-opened for {} -> {}", route_id, target);
            }
            CircuitState::Open => {}
        }
    }

    /// Records a successful forward. A single success in HALF_OPEN closes
    /// the breaker and clears its failure window.
    pub fn record_success(&self, route_id: &str, target: &str, config: &CircuitBreakerPolicy) {
        if !config.enabled {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry((route_id.to_string(), target.to_string()))
            .or_insert_with(BreakerEntry::new);
        entry.last_activity = now;
        entry.total += 1;
        entry.success_count += 1;
        entry.last_success = Some(now);

        if entry.state == CircuitState::HalfOpen {
            entry.state = CircuitState::Closed;
            entry.failures.clear();
            entry.next_attempt = None;
            info!("circuit closed for {} -> {}", route_id, target);
        }
    }

    pub fn state_of(&self, route_id: &str, target: &str) -> Option<CircuitState> {
        self.entries
            .lock()
            .unwrap()
            .get(&(route_id.to_string(), target.to_string()))
            .map(|e| e.state)
    }

    pub fn stats(&self) -> Vec<BreakerStats> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        let mut stats: Vec<BreakerStats> = entries
            .iter()
            .map(|((route_id, target), e)| BreakerStats {
                route_id: route_id.clone(),
                target: target.clone(),
                state: e.state,
                window_failures: e.failures.len(),
                total: e.total,
                success_count: e.success_count,
                failure_count: e.failure_count,
                last_failure_ms_ago: e
                    .last_failure
                    .map(|t| now.duration_since(t).as_millis() as u64),
                last_success_ms_ago: e
                    .last_success
                    .map(|t| now.duration_since(t).as_millis() as u64),
                retry_in_ms: e
                    .next_attempt
                    .and_then(|at| at.checked_duration_since(now))
                    .map(|d| d.as_millis() as u64),
            })
            .collect();
        stats.sort_by(|a, b| (&a.route_id, &a.target).cmp(&(&b.route_id, &b.target)));
        stats
    }

    /// Resets breakers: all of them, or only those of one route.
    pub fn reset(&self, route_id: Option<&str>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        match route_id {
            Some(id) => {
                let before = entries.len();
                entries.retain(|(route, _), _| route != id);
                before - entries.len()
            }
            None => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        }
    }

    /// Drops instances with no activity for `max_idle`. Returns the removed
    /// count.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.last_activity) < max_idle);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
