//! The dispatch loop: composes route matching, admission control, caching,
//! load balancing, circuit breaking and forwarding for every proxied
//! request. Rate limiting runs in middleware ahead of it.

use crate::auth::rbac;
use crate::auth::token::TokenVerifier;
use crate::middleware::auth::bearer_token;
use crate::middleware::trace;
use crate::models::error::GatewayError;
use crate::routes::metrics::MetricsCollector;
use crate::services::cache::{CachedResponse, ResponseCache};
use crate::services::forwarder::{ForwardRequest, Forwarder, UpstreamResponse};
use crate::services::load_balancer::LoadBalancer;
use crate::services::registry::RouteRegistry;
use crate::utils::headers::strip_hop_by_hop;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use std::sync::Arc;
use std::time::Instant;

/// Paths never served from nor stored into the cache.
pub const CACHE_SKIP_PREFIXES: &[&str] =
    &["/health", "/metrics", "/admin", "/api/v1/auth", "/favicon.ico"];

/// Upper bound on a single path segment (URL parameter) length.
const MAX_URL_PARAM_LEN: usize = 100;

pub struct RequestPipeline {
    registry: Arc<RouteRegistry>,
    balancer: Arc<LoadBalancer>,
    cache: Arc<ResponseCache>,
    forwarder: Arc<Forwarder>,
    verifier: Arc<TokenVerifier>,
}

impl RequestPipeline {
    pub fn new(
        registry: Arc<RouteRegistry>,
        balancer: Arc<LoadBalancer>,
        cache: Arc<ResponseCache>,
        forwarder: Arc<Forwarder>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            registry,
            balancer,
            cache,
            forwarder,
            verifier,
        }
    }

    /// Dispatches one inbound request and always produces a response; every
    /// error path maps through the gateway error taxonomy.
    pub async fn handle(&self, req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let started = Instant::now();
        let metrics = req.app_data::<web::Data<MetricsCollector>>().cloned();
        if let Some(metrics) = &metrics {
            metrics.increment_connections();
        }

        let response = self.dispatch(&req, body, started).await;

        if let Some(metrics) = &metrics {
            let status = response.status();
            metrics.record_request(status.is_success(), started.elapsed(), status.as_u16());
            metrics.decrement_connections();
        }
        response
    }

    async fn dispatch(
        &self,
        req: &HttpRequest,
        body: web::Bytes,
        started: Instant,
    ) -> HttpResponse {
        let trace_id = trace::trace_id(req);
        let method = req.method().as_str().to_uppercase();
        let path = req.path().to_string();
        let query = req.query_string().to_string();

        if path.split('/').any(|seg| seg.len() > MAX_URL_PARAM_LEN) {
            return GatewayError::bad_request("URL parameter too long").to_response(&trace_id);
        }

        let Some(route) = self.registry.find_match(&path, &method) else {
            return GatewayError::RouteNotFound { method, path }.to_response(&trace_id);
        };

        // Admission: non-public routes require a verified bearer and, when
        // the route names them, satisfied role/permission predicates. This
        // runs before the cache so an expired token cannot be served a
        // previously stored personalized response.
        if !route.public {
            let principal = match bearer_token(req.headers())
                .and_then(|token| self.verifier.verify(&token))
            {
                Ok(principal) => principal,
                Err(error) => return error.to_response(&trace_id),
            };
            if let Err(error) = rbac::authorize(
                &principal,
                &route.required_roles,
                &route.required_permissions,
                route.auth_logic,
            ) {
                return error.to_response(&trace_id);
            }
        }

        // Cache lookup: GET only, outside the reserved surfaces, keyed with
        // a per-principal discriminator when the request is authenticated.
        let cacheable = method == "GET"
            && !CACHE_SKIP_PREFIXES
                .iter()
                .any(|prefix| path.starts_with(prefix));
        let full_url = if query.is_empty() {
            path.clone()
        } else {
            format!("{}?{}", path, query)
        };
        let user_token = req
            .headers()
            .get("authorization")
            .or_else(|| req.headers().get("x-user-id"))
            .and_then(|v| v.to_str().ok());
        let cache_key = ResponseCache::http_key(&method, &full_url, user_token);

        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key) {
                debug!("cache hit for {}", cache_key);
                return cached_response(hit, started);
            }
        }

        let healthy = self.registry.healthy_replicas(&route.path, &route.method);
        if healthy.is_empty() {
            return GatewayError::BadGateway {
                message: "no healthy backend".to_string(),
            }
            .to_response(&trace_id);
        }

        let route_key = route.key();
        let Some(replica) = self
            .balancer
            .select(&route_key, route.load_balancer, &healthy, None)
        else {
            return GatewayError::BadGateway {
                message: "no healthy backend".to_string(),
            }
            .to_response(&trace_id);
        };

        self.balancer.incr_inflight(&replica.url);
        let result = self
            .forwarder
            .forward(ForwardRequest {
                method: req.method(),
                path: &path,
                query: (!query.is_empty()).then_some(query.as_str()),
                headers: req.headers(),
                body: body.to_vec(),
                replica: &replica,
                timeout_ms: route.timeout_ms,
                retries: route.retries,
                breaker: &route.circuit_breaker,
                route_id: &route.id,
            })
            .await;
        self.balancer.decr_inflight(&replica.url);

        let upstream = match result {
            Ok(upstream) => {
                self.registry
                    .record_replica_result(&route.path, &route.method, &replica.url, true);
                upstream
            }
            Err(error) => {
                // A breaker denial never reached the replica; only real
                // upstream failures count against it.
                if !matches!(error, GatewayError::ServiceUnavailable { .. }) {
                    self.registry
                        .record_replica_result(&route.path, &route.method, &replica.url, false);
                }
                return error.to_response(&trace_id);
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.registry
            .update_replica_latency(&route.path, &route.method, &replica.url, elapsed_ms);

        let client_headers = strip_hop_by_hop(&upstream.headers);

        if cacheable && ResponseCache::should_cache_response(upstream.status, &upstream.headers) {
            let ttl = ResponseCache::ttl_from_headers(&upstream.headers);
            self.cache.set(
                &cache_key,
                CachedResponse {
                    status: upstream.status,
                    headers: client_headers.clone(),
                    body: upstream.body.clone(),
                },
                ttl,
            );
        }

        proxied_response(upstream, client_headers, &replica.url, &route.path, elapsed_ms)
    }
}

fn proxied_response(
    upstream: UpstreamResponse,
    client_headers: Vec<(String, String)>,
    target: &str,
    route_path: &str,
    elapsed_ms: u64,
) -> HttpResponse {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &client_headers {
        builder.append_header((name.as_str(), value.as_str()));
    }
    builder.insert_header(("X-Gateway-Target", target));
    builder.insert_header(("X-Gateway-Response-Time", elapsed_ms.to_string()));
    builder.insert_header(("X-Gateway-Route", route_path));
    builder.insert_header(("X-Cache", "MISS"));
    builder.body(upstream.body)
}

fn cached_response(hit: CachedResponse, started: Instant) -> HttpResponse {
    let status = StatusCode::from_u16(hit.status).unwrap_or(StatusCode::OK);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &hit.headers {
        builder.append_header((name.as_str(), value.as_str()));
    }
    builder.insert_header(("X-Cache", "HIT"));
    builder.insert_header((
        "X-Gateway-Response-Time",
        (started.elapsed().as_millis() as u64).to_string(),
    ));
    builder.body(hit.body)
}
