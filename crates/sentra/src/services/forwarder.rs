//! Upstream request forwarding with timeout, retry and circuit breaking.

use crate::models::error::GatewayError;
use crate::models::route::{CircuitBreakerPolicy, Replica};
use crate::services::circuit_breaker::CircuitBreakerRegistry;
use crate::utils::headers::is_hop_by_hop;
use crate::utils::path::build_upstream_url;
use actix_web::http::Method as ActixMethod;
use chrono::Utc;
use log::{debug, warn};
use rand::Rng;
use reqwest::header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method as ReqwestMethod};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const DEFAULT_USER_AGENT: &str = concat!("sentra/", env!("CARGO_PKG_VERSION"));

/// Backoff ceiling between retry attempts.
const MAX_BACKOFF_MS: u64 = 10_000;
const BASE_BACKOFF_MS: u64 = 1_000;
const MIN_BACKOFF_MS: u64 = 100;

/// One forwarding job, borrowed from the inbound request.
pub struct ForwardRequest<'a> {
    pub method: &'a ActixMethod,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a actix_web::http::header::HeaderMap,
    pub body: Vec<u8>,
    pub replica: &'a Replica,
    pub timeout_ms: u64,
    pub retries: u32,
    pub breaker: &'a CircuitBreakerPolicy,
    pub route_id: &'a str,
}

/// The upstream response, body kept verbatim.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub struct Forwarder {
    client: Client,
    gateway_id: String,
    /// Default body served on a breaker denial; routes may override it
    /// through their breaker policy.
    fallback: serde_json::Value,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl Forwarder {
    /// Creates the forwarder with a pooled upstream client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which indicates a
    /// system resource problem at startup.
    pub fn new(
        gateway_id: String,
        connection_timeout_ms: u64,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .connect_timeout(Duration::from_millis(connection_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            gateway_id,
            fallback: serde_json::json!({ "message": "Service temporarily unavailable" }),
            breakers,
        }
    }

    /// Replaces the default fallback body returned when a circuit is open.
    pub fn with_fallback(mut self, fallback: serde_json::Value) -> Self {
        self.fallback = fallback;
        self
    }

    /// Forwards the request to one replica.
    ///
    /// Server-class failures (5xx, connect errors, timeouts) are recorded
    /// with the breaker and retried up to `retries` times with exponential
    /// backoff and jitter. 4xx responses are successes from the breaker's
    /// point of view and are returned unchanged.
    pub async fn forward(&self, req: ForwardRequest<'_>) -> Result<UpstreamResponse, GatewayError> {
        let url = build_upstream_url(&req.replica.url, req.path, req.query);
        let method = convert_method(req.method);
        let upstream_headers = self.build_upstream_headers(req.headers);
        let send_body = !matches!(method, ReqwestMethod::GET | ReqwestMethod::HEAD);
        let max_attempts = req.retries + 1;

        for attempt in 0..max_attempts {
            if !self
                .breakers
                .can_execute(req.route_id, &req.replica.url, req.breaker)
            {
                let fallback = req
                    .breaker
                    .fallback
                    .clone()
                    .unwrap_or_else(|| self.fallback.clone());
                return Err(GatewayError::ServiceUnavailable {
                    retry_after: (req.breaker.timeout_ms / 1_000).max(1),
                    fallback: Some(fallback),
                });
            }

            if attempt > 0 {
                warn!(
                    "retry {}/{} for {} {}",
                    attempt, req.retries, method, url
                );
            } else {
                debug!("forwarding {} {}", method, url);
            }

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .headers(upstream_headers.clone());
            if send_body && !req.body.is_empty() {
                builder = builder.body(req.body.clone());
            }

            match timeout(Duration::from_millis(req.timeout_ms), builder.send()).await {
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    if status >= 500 {
                        self.breakers
                            .record_failure(req.route_id, &req.replica.url, req.breaker);
                        if attempt + 1 < max_attempts {
                            backoff(attempt + 1).await;
                            continue;
                        }
                        return Err(GatewayError::BadGateway {
                            message: "upstream error".to_string(),
                        });
                    }

                    self.breakers
                        .record_success(req.route_id, &req.replica.url, req.breaker);
                    let headers = response
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.as_str().to_string(),
                                String::from_utf8_lossy(value.as_bytes()).to_string(),
                            )
                        })
                        .collect();
                    let body = response.bytes().await.map_err(|e| {
                        debug!("failed reading upstream body: {}", e);
                        GatewayError::BadGateway {
                            message: "failed reading upstream response".to_string(),
                        }
                    })?;
                    return Ok(UpstreamResponse {
                        status,
                        headers,
                        body: body.to_vec(),
                    });
                }
                Ok(Err(error)) => {
                    debug!("upstream connection error for {}: {}", url, error);
                    self.breakers
                        .record_failure(req.route_id, &req.replica.url, req.breaker);
                    if attempt + 1 < max_attempts {
                        backoff(attempt + 1).await;
                        continue;
                    }
                    return Err(GatewayError::BadGateway {
                        message: "upstream connection failed".to_string(),
                    });
                }
                Err(_) => {
                    // Elapsed: the in-flight upstream call is dropped here.
                    self.breakers
                        .record_failure(req.route_id, &req.replica.url, req.breaker);
                    if attempt + 1 < max_attempts {
                        backoff(attempt + 1).await;
                        continue;
                    }
                    return Err(GatewayError::GatewayTimeout {
                        timeout_ms: req.timeout_ms,
                    });
                }
            }
        }

        Err(GatewayError::BadGateway {
            message: "retry attempts exhausted".to_string(),
        })
    }

    /// Copies request headers for the upstream call, dropping `Host` and
    /// hop-by-hop headers, stamping the forwarding headers and defaulting
    /// the `User-Agent`.
    fn build_upstream_headers(
        &self,
        original: &actix_web::http::header::HeaderMap,
    ) -> ReqwestHeaderMap {
        let mut headers = ReqwestHeaderMap::with_capacity(original.len() + 3);

        for (name, value) in original {
            let name_str = name.as_str();
            if name_str.eq_ignore_ascii_case("host") || is_hop_by_hop(name_str) {
                continue;
            }
            if let (Ok(upstream_name), Ok(upstream_value)) = (
                HeaderName::from_bytes(name_str.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(upstream_name, upstream_value);
            }
        }

        if let Ok(value) = HeaderValue::from_str(&self.gateway_id) {
            headers.insert("x-forwarded-by", value);
        }
        if let Ok(value) = HeaderValue::from_str(&Utc::now().to_rfc3339()) {
            headers.insert("x-forwarded-at", value);
        }
        headers
            .entry("user-agent")
            .or_insert_with(|| HeaderValue::from_static(DEFAULT_USER_AGENT));

        headers
    }
}

fn convert_method(method: &ActixMethod) -> ReqwestMethod {
    match method.as_str() {
        "GET" => ReqwestMethod::GET,
        "POST" => ReqwestMethod::POST,
        "PUT" => ReqwestMethod::PUT,
        "DELETE" => ReqwestMethod::DELETE,
        "HEAD" => ReqwestMethod::HEAD,
        "OPTIONS" => ReqwestMethod::OPTIONS,
        "PATCH" => ReqwestMethod::PATCH,
        "TRACE" => ReqwestMethod::TRACE,
        _ => ReqwestMethod::GET,
    }
}

/// Sleeps for `min(10s, 1s * 2^(attempt-1))` with uniform jitter in +/-25%
/// of that base, floored at 100 ms.
async fn backoff(attempt: u32) {
    let delay_ms = {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = BASE_BACKOFF_MS.saturating_mul(1 << exponent).min(MAX_BACKOFF_MS);
        let jitter = rand::thread_rng().gen_range(-(base as f64) * 0.25..=(base as f64) * 0.25);
        ((base as f64 + jitter).max(MIN_BACKOFF_MS as f64)) as u64
    };
    sleep(Duration::from_millis(delay_ms)).await;
}
