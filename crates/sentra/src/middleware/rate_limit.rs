//! Rate limiting middleware over the fixed-window limiter service.
//!
//! Applied globally; evaluates the base and endpoint-specific rules for
//! every request outside the skip list. Allowed responses carry the
//! `X-RateLimit-*` headers for the most restrictive rule that applied;
//! denials answer 429 with `Retry-After`.

use crate::auth::token::TokenVerifier;
use crate::middleware::trace::TraceId;
use crate::models::error::GatewayError;
use crate::services::rate_limiter::{RateLimiter, RequestMeta};
use crate::utils::path::client_ip;
use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderValue,
    Error, HttpMessage,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::warn;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Gateway-internal surfaces exempt from rate limiting.
const SKIP_PATHS: &[&str] = &["/health", "/metrics", "/favicon.ico"];

pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    verifier: Arc<TokenVerifier>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, verifier: Arc<TokenVerifier>) -> Self {
        Self { limiter, verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            verifier: self.verifier.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    verifier: Arc<TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let path = req.path().to_string();
            if SKIP_PATHS
                .iter()
                .any(|p| path == *p || path.starts_with(&format!("{}/", p)))
            {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }

            let meta = request_meta(&req, &verifier);
            let decision = limiter.check(&meta);

            if !decision.allowed {
                warn!(
                    "rate limit exceeded: rule={} key scope ip={} path={}",
                    decision.rule, meta.ip, meta.path
                );
                let trace_id = req
                    .extensions()
                    .get::<TraceId>()
                    .map(|t| t.0.clone())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let mut response = GatewayError::RateLimited {
                    retry_after: decision.retry_after.unwrap_or(1),
                }
                .to_response(&trace_id);
                append_limit_headers(response.headers_mut(), &decision);
                return Ok(req.into_response(response));
            }

            let mut res = service.call(req).await?;
            if decision.limited() {
                append_limit_headers(res.headers_mut(), &decision);
            }
            Ok(res.map_into_boxed_body())
        })
    }
}

fn request_meta(req: &ServiceRequest, verifier: &TokenVerifier) -> RequestMeta {
    let ip = client_ip(req.headers(), req.connection_info().peer_addr());

    // Best-effort subject extraction so `{user}` scoped rules apply;
    // admission itself is enforced downstream, by the auth middleware on
    // built-in resources and by the dispatch pipeline for proxied routes.
    let user_id = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| verifier.verify(token).ok())
        .map(|principal| principal.id);

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    RequestMeta {
        ip,
        user_id,
        path: req.path().to_string(),
        method: req.method().as_str().to_string(),
        user_agent,
    }
}

fn append_limit_headers(
    headers: &mut actix_web::http::header::HeaderMap,
    decision: &crate::services::rate_limiter::Decision,
) {
    let entries = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at.timestamp().to_string()),
    ];
    for (name, value) in entries {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(actix_web::http::header::HeaderName::from_static(name), value);
        }
    }
}
