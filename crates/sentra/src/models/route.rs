use crate::auth::rbac::AuthLogic;
use crate::models::principal::{Permission, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Load balancing policy for distributing requests across a route's replicas.
///
/// # Policies
///
/// - **RoundRobin**: per-route counter, even circular distribution
/// - **WeightedRoundRobin**: counter modulo sum of weights
/// - **LeastConnections**: replica with fewest in-flight forwardings
/// - **LeastResponseTime**: replica with smallest observed latency
/// - **HealthBased**: replica with fewest recorded errors
/// - **Random**: uniform over the healthy set
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerPolicy {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    LeastResponseTime,
    HealthBased,
    Random,
}

impl Default for LoadBalancerPolicy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

impl LoadBalancerPolicy {
    /// Parses the policy from its configuration spelling (kebab-case, as in
    /// `LOAD_BALANCER_ALGORITHM=round-robin`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" => Some(Self::RoundRobin),
            "weighted-round-robin" | "weighted_round_robin" => Some(Self::WeightedRoundRobin),
            "least-connections" | "least_connections" => Some(Self::LeastConnections),
            "least-response-time" | "least_response_time" => Some(Self::LeastResponseTime),
            "health-based" | "health_based" => Some(Self::HealthBased),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

/// One upstream endpoint of a route.
///
/// Health and latency fields are mutated only by the health monitor and the
/// forwarding path; external callers replace replicas wholesale through a
/// route re-put.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Replica {
    /// Base URL including protocol, e.g. `http://backend-1:8080`.
    pub url: String,

    /// Static weight for weighted-round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Whether this replica is currently considered healthy. Replicas are
    /// declared healthy at construction until a probe says otherwise.
    #[serde(default = "default_healthy")]
    pub healthy: bool,

    /// Timestamp of the last health probe or forward result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,

    /// Last observed end-to-end latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    /// Consecutive error count (decremented on success, floor 0).
    #[serde(default)]
    pub error_count: u32,

    /// Lifetime error count.
    #[serde(default)]
    pub total_errors: u64,
}

fn default_weight() -> u32 {
    1
}

fn default_healthy() -> bool {
    true
}

impl Replica {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight: 1,
            healthy: true,
            last_check: None,
            response_time_ms: None,
            error_count: 0,
            total_errors: 0,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(format!(
                "Target url must start with http:// or https://: {}",
                self.url
            ));
        }
        if self.weight == 0 {
            return Err("Target weight must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Active health probing configuration for a route.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthCheckPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path appended to each replica's base URL for the probe request.
    #[serde(default = "default_health_path")]
    pub path: String,

    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive successful probes required before an unhealthy replica is
    /// marked healthy again.
    #[serde(default = "default_flip_threshold")]
    pub healthy_threshold: u32,

    /// Consecutive failed probes required before a healthy replica is marked
    /// unhealthy.
    #[serde(default = "default_flip_threshold")]
    pub unhealthy_threshold: u32,
}

fn default_true() -> bool {
    true
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_health_interval_ms() -> u64 {
    30_000
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

fn default_flip_threshold() -> u32 {
    2
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_health_path(),
            interval_ms: default_health_interval_ms(),
            timeout_ms: default_health_timeout_ms(),
            healthy_threshold: default_flip_threshold(),
            unhealthy_threshold: default_flip_threshold(),
        }
    }
}

/// Circuit breaker configuration for a route's replicas.
///
/// `threshold` server-class failures within `window_ms` open the breaker;
/// after `timeout_ms` a single probe request is allowed through.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CircuitBreakerPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,

    #[serde(default = "default_breaker_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_breaker_timeout_ms")]
    pub timeout_ms: u64,

    /// Canned body returned while the breaker is open. When unset, the
    /// forwarder's default fallback applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<serde_json::Value>,
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_window_ms() -> u64 {
    60_000
}

fn default_breaker_timeout_ms() -> u64 {
    30_000
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_breaker_threshold(),
            window_ms: default_breaker_window_ms(),
            timeout_ms: default_breaker_timeout_ms(),
            fallback: None,
        }
    }
}

const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE",
];

/// Route definition as submitted through the admin surface.
///
/// The path may contain parameter segments (`:name`, matching exactly one
/// segment) and a trailing `*` wildcard. A route is uniquely keyed by
/// (method, path).
///
/// ```json
/// {
///   "path": "/api/users/:id",
///   "method": "GET",
///   "targets": [
///     {"url": "http://users-1:8080", "weight": 2},
///     {"url": "http://users-2:8080"}
///   ],
///   "load_balancer": "weighted-round-robin",
///   "timeout_ms": 10000,
///   "retries": 2,
///   "public": false,
///   "required_roles": ["user"]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteConfig {
    pub path: String,
    pub method: String,
    pub targets: Vec<Replica>,

    #[serde(default)]
    pub load_balancer: LoadBalancerPolicy,

    #[serde(default)]
    pub health_check: HealthCheckPolicy,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerPolicy,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_true")]
    pub active: bool,

    /// Public routes bypass the token verifier and authorizer entirely.
    #[serde(default)]
    pub public: bool,

    /// Roles accepted for admission (ANY semantics). Empty means any
    /// authenticated principal.
    #[serde(default)]
    pub required_roles: Vec<Role>,

    /// Permissions required for admission, combined per `auth_logic`.
    #[serde(default)]
    pub required_permissions: Vec<Permission>,

    #[serde(default)]
    pub auth_logic: AuthLogic,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl RouteConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err("Route path must start with '/'".to_string());
        }

        let method = self.method.to_uppercase();
        if !VALID_METHODS.contains(&method.as_str()) {
            return Err(format!("Invalid HTTP method: {}", self.method));
        }

        if self.targets.is_empty() {
            return Err("At least one target must be specified".to_string());
        }
        for (i, target) in self.targets.iter().enumerate() {
            target
                .validate()
                .map_err(|e| format!("Target {} validation failed: {}", i, e))?;
        }

        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        if self.retries > 10 {
            return Err("retries should not exceed 10 to prevent excessive delays".to_string());
        }

        if self.public
            && (!self.required_roles.is_empty() || !self.required_permissions.is_empty())
        {
            return Err("Public routes cannot require roles or permissions".to_string());
        }

        Ok(())
    }
}

/// A registered route: the admin-supplied configuration plus the identity
/// and timestamps assigned by the registry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Route {
    pub id: String,
    pub path: String,
    pub method: String,
    pub targets: Vec<Replica>,
    pub load_balancer: LoadBalancerPolicy,
    pub health_check: HealthCheckPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub timeout_ms: u64,
    pub retries: u32,
    pub active: bool,
    pub public: bool,
    pub required_roles: Vec<Role>,
    pub required_permissions: Vec<Permission>,
    pub auth_logic: AuthLogic,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn from_config(config: RouteConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            path: config.path,
            method: config.method.to_uppercase(),
            targets: config.targets,
            load_balancer: config.load_balancer,
            health_check: config.health_check,
            circuit_breaker: config.circuit_breaker,
            timeout_ms: config.timeout_ms,
            retries: config.retries,
            active: config.active,
            public: config.public,
            required_roles: config.required_roles,
            required_permissions: config.required_permissions,
            auth_logic: config.auth_logic,
            created_at: now,
            updated_at: now,
        }
    }

    /// Route key used for load balancer counters and logging.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn healthy_targets(&self) -> Vec<Replica> {
        self.targets.iter().filter(|t| t.healthy).cloned().collect()
    }
}
