use actix_web::{web, HttpResponse, Result};
use serde_json::json;

/// Health check endpoint
pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Readiness check endpoint (for Kubernetes)
pub async fn readiness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Liveness check endpoint (for Kubernetes)
pub async fn liveness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn favicon() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Configure health check routes
pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/health/ready", web::get().to(readiness_check))
        .route("/health/live", web::get().to(liveness_check))
        .route("/favicon.ico", web::get().to(favicon));
}
