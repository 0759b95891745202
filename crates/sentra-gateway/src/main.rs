//! Sentra API Gateway Server
//!
//! Binary entry point: loads settings from the environment, builds the
//! service graph (registry, balancer, breakers, limiter, cache, forwarder,
//! pipeline), starts the periodic sweepers and the health monitor, and runs
//! the HTTP server until a shutdown signal arrives.

use sentra::auth::password::argon2_from;
use sentra::auth::token::TokenVerifier;
use sentra::auth::users::UserStore;
use sentra::config::settings::load_settings;
use sentra::logs::logger::configure_logger;
use sentra::middleware::rate_limit::RateLimit;
use sentra::middleware::security::{cors_headers, security_headers};
use sentra::middleware::trace::Trace;
use sentra::routes::{admin, auth_http, health, metrics, proxy};
use sentra::services::cache::{ResponseCache, DEFAULT_MAX_BYTES};
use sentra::services::circuit_breaker::CircuitBreakerRegistry;
use sentra::services::forwarder::Forwarder;
use sentra::services::health_monitor::HealthMonitor;
use sentra::services::load_balancer::LoadBalancer;
use sentra::services::pipeline::RequestPipeline;
use sentra::services::rate_limiter::RateLimiter;
use sentra::services::registry::RouteRegistry;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::interval;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const BREAKER_IDLE: Duration = Duration::from_secs(300);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = load_settings();
    if let Err(e) = settings.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!("Starting Sentra API Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Service graph.
    let verifier = Arc::new(TokenVerifier::new(
        settings.jwt_secret.clone(),
        settings.jwt_expires_in_secs,
        settings.jwt_refresh_expires_in_secs,
    ));
    let users = Arc::new(UserStore::new(argon2_from(&settings)));
    if let Err(e) = users.seed_admin() {
        error!("Failed to seed admin user: {}", e);
        std::process::exit(1);
    }

    let registry = Arc::new(RouteRegistry::with_demo_routes());
    let balancer = Arc::new(LoadBalancer::new());
    let breakers = Arc::new(CircuitBreakerRegistry::new());
    let cache = Arc::new(ResponseCache::new(
        settings.cache_max_entries,
        DEFAULT_MAX_BYTES,
        Duration::from_millis(settings.cache_ttl_ms),
    ));
    let limiter = Arc::new(RateLimiter::new(RateLimiter::default_rules(
        settings.rate_limit_max,
        settings.rate_limit_ttl_secs,
    )));
    let forwarder = Arc::new(Forwarder::new(
        "sentra-gateway".to_string(),
        settings.connection_timeout_ms,
        breakers.clone(),
    ));
    let pipeline = Arc::new(RequestPipeline::new(
        registry.clone(),
        balancer.clone(),
        cache.clone(),
        forwarder.clone(),
        verifier.clone(),
    ));
    let metrics_collector = metrics::MetricsCollector::default();

    let monitor = Arc::new(HealthMonitor::new(registry.clone()));
    monitor.start();

    // Periodic sweepers: rate-limit window expiry, breaker idle cleanup,
    // cache expiry. All are aborted on shutdown.
    let mut sweepers = Vec::new();
    sweepers.push(tokio::spawn({
        let limiter = limiter.clone();
        async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep_expired();
                if removed > 0 {
                    debug!("rate limiter sweep removed {} windows", removed);
                }
            }
        }
    }));
    sweepers.push(tokio::spawn({
        let breakers = breakers.clone();
        async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = breakers.sweep_idle(BREAKER_IDLE);
                if removed > 0 {
                    debug!("breaker sweep removed {} idle instances", removed);
                }
            }
        }
    }));
    sweepers.push(tokio::spawn({
        let cache = cache.clone();
        async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!("cache sweep removed {} expired entries", removed);
                }
            }
        }
    }));

    let host = settings.host.clone();
    let port = settings.port;
    let cors_origin = settings.cors_origin.clone();
    info!("Listening on {}:{}", host, port);

    let server = {
        let registry = registry.clone();
        let balancer = balancer.clone();
        let breakers = breakers.clone();
        let cache = cache.clone();
        let limiter = limiter.clone();
        let monitor = monitor.clone();
        let users = users.clone();
        let verifier = verifier.clone();
        let pipeline = pipeline.clone();
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::from(registry.clone()))
                .app_data(web::Data::from(balancer.clone()))
                .app_data(web::Data::from(breakers.clone()))
                .app_data(web::Data::from(cache.clone()))
                .app_data(web::Data::from(limiter.clone()))
                .app_data(web::Data::from(monitor.clone()))
                .app_data(web::Data::from(users.clone()))
                .app_data(web::Data::from(verifier.clone()))
                .app_data(web::Data::new(metrics_collector.clone()))
                .app_data(web::JsonConfig::default().limit(1024 * 1024).error_handler(
                    |err, req| {
                        let response = sentra::models::error::GatewayError::bad_request(
                            "Invalid request body",
                        )
                        .to_response(&sentra::middleware::trace::trace_id(req));
                        actix_web::error::InternalError::from_response(err, response).into()
                    },
                ))
                .app_data(web::PayloadConfig::new(1024 * 1024))
                .wrap(RateLimit::new(limiter.clone(), verifier.clone()))
                .wrap(cors_headers(&cors_origin))
                .wrap(security_headers())
                .wrap(Logger::new(
                    r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
                ))
                .wrap(Trace)
                .configure(health::configure_health)
                .configure(metrics::configure_metrics)
                .configure(|cfg| auth_http::configure_auth(cfg, verifier.clone()))
                .configure(|cfg| admin::configure_admin(cfg, verifier.clone()))
                .configure(|cfg| proxy::configure_proxy(cfg, pipeline.clone()))
        })
        .bind((host.as_str(), port))?
        .run()
    };

    // Graceful shutdown: stop on ctrl-c, then cancel probes and sweepers.
    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped"),
                Err(e) => error!("Server error: {}", e),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping");
        }
    }

    monitor.shutdown();
    for sweeper in sweepers {
        sweeper.abort();
    }

    Ok(())
}
