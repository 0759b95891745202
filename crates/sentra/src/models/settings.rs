use crate::models::route::LoadBalancerPolicy;

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-in-production";

/// Runtime configuration for the gateway, resolved from the environment by
/// [`crate::config::settings::load_settings`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Deployment environment (`development`, `test`, `production`).
    pub environment: String,
    pub cors_origin: String,

    pub jwt_secret: String,
    pub jwt_expires_in_secs: u64,
    pub jwt_refresh_expires_in_secs: u64,

    pub argon2_time_cost: u32,
    pub argon2_memory_cost: u32,
    pub argon2_parallelism: u32,

    pub rate_limit_ttl_secs: u64,
    pub rate_limit_max: u64,

    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_ms: u64,

    pub load_balancer_algorithm: LoadBalancerPolicy,

    pub health_check_interval_ms: u64,
    pub health_check_timeout_ms: u64,

    /// Default cache TTL in milliseconds (configured in seconds).
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,

    pub request_timeout_ms: u64,
    pub connection_timeout_ms: u64,
}

impl Settings {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be between 1 and 65535".to_string());
        }
        if self.jwt_secret.is_empty() {
            return Err("JWT_SECRET cannot be empty".to_string());
        }
        if self.is_production() && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err("JWT_SECRET must be changed from the default in production".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT must be greater than 0".to_string());
        }
        if self.rate_limit_max == 0 {
            return Err("RATE_LIMIT_MAX must be greater than 0".to_string());
        }
        Ok(())
    }
}
