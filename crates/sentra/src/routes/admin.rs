//! Administrative surface under `/admin/gateway`.
//!
//! Every endpoint requires a valid bearer; individual groups additionally
//! require permissions: route management `configure:routes`, stats
//! `view:metrics`, resets and cache/limiter mutation `manage:rate_limits`.

use crate::auth::rbac::{self, AuthLogic};
use crate::auth::token::TokenVerifier;
use crate::middleware::auth::JwtAuth;
use crate::middleware::trace::trace_id;
use crate::models::error::GatewayError;
use crate::models::principal::Permission;
use crate::models::route::{Route, RouteConfig};
use crate::routes::auth_http::current_principal;
use crate::services::cache::ResponseCache;
use crate::services::circuit_breaker::CircuitBreakerRegistry;
use crate::services::health_monitor::HealthMonitor;
use crate::services::load_balancer::LoadBalancer;
use crate::services::rate_limiter::RateLimiter;
use crate::services::registry::RouteRegistry;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Response envelope for route management operations.
#[derive(Serialize, Deserialize)]
pub struct RouteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
}

fn require(req: &HttpRequest, permission: Permission) -> Result<(), GatewayError> {
    let principal = current_principal(req)
        .ok_or_else(|| GatewayError::unauthorized("Authentication required"))?;
    rbac::authorize(&principal, &[], &[permission], AuthLogic::Any)
}

#[get("/routes")]
pub async fn list_routes(req: HttpRequest, registry: web::Data<RouteRegistry>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ConfigureRoutes) {
        return e.to_response(&trace_id(&req));
    }
    let routes = registry.list();
    HttpResponse::Ok().json(RouteResponse {
        success: true,
        message: format!("Found {} routes", routes.len()),
        route: None,
        routes: Some(routes),
    })
}

#[get("/routes/{method}/{path:.*}")]
pub async fn get_route(
    req: HttpRequest,
    registry: web::Data<RouteRegistry>,
    params: web::Path<(String, String)>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ConfigureRoutes) {
        return e.to_response(&trace_id(&req));
    }
    let (method, tail) = params.into_inner();
    let path = format!("/{}", tail);
    match registry.get(&path, &method) {
        Some(route) => HttpResponse::Ok().json(RouteResponse {
            success: true,
            message: "Route found".to_string(),
            route: Some(route),
            routes: None,
        }),
        None => GatewayError::RouteNotFound { method, path }.to_response(&trace_id(&req)),
    }
}

#[post("/routes")]
pub async fn put_route(
    req: HttpRequest,
    registry: web::Data<RouteRegistry>,
    monitor: web::Data<HealthMonitor>,
    config: web::Json<RouteConfig>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ConfigureRoutes) {
        return e.to_response(&trace_id(&req));
    }
    match registry.put(config.into_inner()) {
        Ok(route) => {
            monitor.resync();
            HttpResponse::Created().json(RouteResponse {
                success: true,
                message: "Route stored".to_string(),
                route: Some(route),
                routes: None,
            })
        }
        Err(e) => e.to_response(&trace_id(&req)),
    }
}

#[delete("/routes/{method}/{path:.*}")]
pub async fn delete_route(
    req: HttpRequest,
    registry: web::Data<RouteRegistry>,
    monitor: web::Data<HealthMonitor>,
    params: web::Path<(String, String)>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ConfigureRoutes) {
        return e.to_response(&trace_id(&req));
    }
    let (method, tail) = params.into_inner();
    let path = format!("/{}", tail);
    if registry.delete(&path, &method) {
        monitor.resync();
        HttpResponse::Ok().json(RouteResponse {
            success: true,
            message: "Route deleted".to_string(),
            route: None,
            routes: None,
        })
    } else {
        GatewayError::RouteNotFound { method, path }.to_response(&trace_id(&req))
    }
}

#[get("/load-balancer/stats")]
pub async fn load_balancer_stats(
    req: HttpRequest,
    balancer: web::Data<LoadBalancer>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ViewMetrics) {
        return e.to_response(&trace_id(&req));
    }
    HttpResponse::Ok().json(balancer.stats())
}

#[get("/rate-limit/stats")]
pub async fn rate_limit_stats(req: HttpRequest, limiter: web::Data<RateLimiter>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ViewMetrics) {
        return e.to_response(&trace_id(&req));
    }
    HttpResponse::Ok().json(limiter.stats())
}

#[get("/circuit-breaker/stats")]
pub async fn circuit_breaker_stats(
    req: HttpRequest,
    breakers: web::Data<CircuitBreakerRegistry>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ViewMetrics) {
        return e.to_response(&trace_id(&req));
    }
    HttpResponse::Ok().json(breakers.stats())
}

#[get("/cache/stats")]
pub async fn cache_stats(req: HttpRequest, cache: web::Data<ResponseCache>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ViewMetrics) {
        return e.to_response(&trace_id(&req));
    }
    HttpResponse::Ok().json(cache.stats())
}

#[get("/health/stats")]
pub async fn health_stats(req: HttpRequest, registry: web::Data<RouteRegistry>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ViewMetrics) {
        return e.to_response(&trace_id(&req));
    }
    HttpResponse::Ok().json(registry.health_snapshot())
}

#[post("/rate-limit/reset")]
pub async fn reset_rate_limits(req: HttpRequest, limiter: web::Data<RateLimiter>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    limiter.reset();
    HttpResponse::Ok().json(json!({ "success": true, "message": "Rate limit windows cleared" }))
}

#[delete("/rate-limit/{key:.*}")]
pub async fn delete_rate_limit_key(
    req: HttpRequest,
    limiter: web::Data<RateLimiter>,
    key: web::Path<String>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    let key = key.into_inner();
    if limiter.remove(&key) {
        HttpResponse::Ok().json(json!({ "success": true, "message": "Window removed" }))
    } else {
        GatewayError::NotFound {
            message: format!("No window for key: {}", key),
        }
        .to_response(&trace_id(&req))
    }
}

#[post("/circuit-breaker/reset")]
pub async fn reset_circuit_breakers(
    req: HttpRequest,
    breakers: web::Data<CircuitBreakerRegistry>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    let removed = breakers.reset(None);
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Reset {} circuit breakers", removed),
    }))
}

#[post("/load-balancer/reset")]
pub async fn reset_load_balancer(
    req: HttpRequest,
    balancer: web::Data<LoadBalancer>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    balancer.reset();
    HttpResponse::Ok().json(json!({ "success": true, "message": "Load balancer counters cleared" }))
}

#[post("/cache/clear")]
pub async fn clear_cache(req: HttpRequest, cache: web::Data<ResponseCache>) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    cache.clear();
    HttpResponse::Ok().json(json!({ "success": true, "message": "Cache cleared" }))
}

#[delete("/cache/{key:.*}")]
pub async fn delete_cache_key(
    req: HttpRequest,
    cache: web::Data<ResponseCache>,
    key: web::Path<String>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::ManageRateLimits) {
        return e.to_response(&trace_id(&req));
    }
    let key = key.into_inner();
    if cache.delete(&key) {
        HttpResponse::Ok().json(json!({ "success": true, "message": "Entry removed" }))
    } else {
        GatewayError::NotFound {
            message: format!("No cache entry for key: {}", key),
        }
        .to_response(&trace_id(&req))
    }
}

#[get("/overview")]
pub async fn overview(
    req: HttpRequest,
    registry: web::Data<RouteRegistry>,
    limiter: web::Data<RateLimiter>,
    breakers: web::Data<CircuitBreakerRegistry>,
    cache: web::Data<ResponseCache>,
    monitor: web::Data<HealthMonitor>,
) -> HttpResponse {
    if let Err(e) = require(&req, Permission::AccessAdmin) {
        return e.to_response(&trace_id(&req));
    }
    let cache_stats_snapshot = cache.stats();
    HttpResponse::Ok().json(json!({
        "routes": registry.len(),
        "health_probes": monitor.probe_count(),
        "rate_limit_windows": limiter.stats().active_windows,
        "circuit_breakers": breakers.len(),
        "cache": { "entries": cache_stats_snapshot.entries, "bytes": cache_stats_snapshot.bytes },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Mounts the admin surface behind bearer admission.
pub fn configure_admin(cfg: &mut web::ServiceConfig, verifier: Arc<TokenVerifier>) {
    cfg.service(
        web::scope("/admin/gateway")
            .wrap(JwtAuth::new(verifier))
            .service(list_routes)
            .service(put_route)
            .service(get_route)
            .service(delete_route)
            .service(load_balancer_stats)
            .service(rate_limit_stats)
            .service(circuit_breaker_stats)
            .service(cache_stats)
            .service(health_stats)
            .service(reset_rate_limits)
            .service(delete_rate_limit_key)
            .service(reset_circuit_breakers)
            .service(reset_load_balancer)
            .service(clear_cache)
            .service(delete_cache_key)
            .service(overview),
    );
}
