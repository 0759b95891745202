use crate::models::route::LoadBalancerPolicy;
use crate::models::settings::{Settings, DEFAULT_JWT_SECRET};
use log::warn;
use std::str::FromStr;

/// Loads gateway settings from the environment.
///
/// Every variable has a default; a malformed value logs a warning and falls
/// back rather than aborting startup. `CACHE_TTL`, `RATE_LIMIT_TTL` and the
/// JWT lifetimes are configured in seconds (JWT ones also accept `s`/`m`/
/// `h`/`d` suffixes like `1h` or `7d`); the core works in milliseconds
/// internally.
pub fn load_settings() -> Settings {
    let load_balancer_algorithm = {
        let raw = env_string("LOAD_BALANCER_ALGORITHM", "round-robin");
        LoadBalancerPolicy::parse(&raw).unwrap_or_else(|| {
            warn!(
                "Unknown LOAD_BALANCER_ALGORITHM '{}', falling back to round-robin",
                raw
            );
            LoadBalancerPolicy::RoundRobin
        })
    };

    let jwt_secret = env_string("JWT_SECRET", DEFAULT_JWT_SECRET);
    if jwt_secret == DEFAULT_JWT_SECRET {
        warn!("JWT_SECRET not set, using the development default");
    }

    Settings {
        host: env_string("HOST", "0.0.0.0"),
        port: env_parse("PORT", 3000u16),
        environment: env_string("NODE_ENV", "development"),
        cors_origin: env_string("CORS_ORIGIN", "http://localhost:3000"),

        jwt_secret,
        jwt_expires_in_secs: env_duration_secs("JWT_EXPIRES_IN", 3_600),
        jwt_refresh_expires_in_secs: env_duration_secs("JWT_REFRESH_EXPIRES_IN", 7 * 24 * 3_600),

        argon2_time_cost: env_parse("ARGON2_TIME_COST", 2u32),
        argon2_memory_cost: env_parse("ARGON2_MEMORY_COST", 65_536u32),
        argon2_parallelism: env_parse("ARGON2_PARALLELISM", 1u32),

        rate_limit_ttl_secs: env_parse("RATE_LIMIT_TTL", 60u64),
        rate_limit_max: env_parse("RATE_LIMIT_MAX", 1_000u64),

        circuit_breaker_threshold: env_parse("CIRCUIT_BREAKER_THRESHOLD", 5u32),
        circuit_breaker_timeout_ms: env_parse("CIRCUIT_BREAKER_TIMEOUT", 30_000u64),

        load_balancer_algorithm,

        health_check_interval_ms: env_parse("HEALTH_CHECK_INTERVAL", 30_000u64),
        health_check_timeout_ms: env_parse("HEALTH_CHECK_TIMEOUT", 5_000u64),

        cache_ttl_ms: env_parse("CACHE_TTL", 300u64) * 1_000,
        cache_max_entries: env_parse("CACHE_MAX_SIZE", 1_000usize),

        request_timeout_ms: env_parse("REQUEST_TIMEOUT", 30_000u64),
        connection_timeout_ms: env_parse("CONNECTION_TIMEOUT", 5_000u64),
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default", raw, name);
            default
        }),
        Err(_) => default,
    }
}

fn env_duration_secs(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => parse_duration_secs(&raw).unwrap_or_else(|| {
            warn!("Invalid duration '{}' for {}, using default", raw, name);
            default
        }),
        Err(_) => default,
    }
}

/// Parses `30`, `30s`, `15m`, `1h` or `7d` into seconds.
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (number, multiplier) = match value.chars().last() {
        Some('s') => (&value[..value.len() - 1], 1),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('h') => (&value[..value.len() - 1], 3_600),
        Some('d') => (&value[..value.len() - 1], 86_400),
        _ => (value, 1),
    };
    number.parse::<u64>().ok().map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_suffixes() {
        assert_eq!(parse_duration_secs("30"), Some(30));
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("1h"), Some(3_600));
        assert_eq!(parse_duration_secs("7d"), Some(604_800));
        assert_eq!(parse_duration_secs("abc"), None);
        assert_eq!(parse_duration_secs(""), None);
    }
}
