use actix_web::{test, web, App};
use sentra::auth::token::TokenVerifier;
use sentra::middleware::trace::Trace;
use sentra::models::principal::{Principal, Role};
use sentra::routes::admin;
use sentra::services::cache::{ResponseCache, DEFAULT_MAX_BYTES};
use sentra::services::circuit_breaker::CircuitBreakerRegistry;
use sentra::services::health_monitor::HealthMonitor;
use sentra::services::load_balancer::LoadBalancer;
use sentra::services::rate_limiter::{RateLimiter, RequestMeta, Rule};
use sentra::services::registry::RouteRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "admin-test-secret";

struct Fixture {
    registry: Arc<RouteRegistry>,
    limiter: Arc<RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    verifier: Arc<TokenVerifier>,
}

fn fixture() -> (
    Fixture,
    Arc<LoadBalancer>,
    Arc<ResponseCache>,
    Arc<HealthMonitor>,
) {
    let registry = Arc::new(RouteRegistry::new());
    let limiter = Arc::new(RateLimiter::new(vec![Rule::new("ip", "ip:{ip}", 10, 60_000)]));
    let breakers = Arc::new(CircuitBreakerRegistry::new());
    let balancer = Arc::new(LoadBalancer::new());
    let cache = Arc::new(ResponseCache::new(
        10,
        DEFAULT_MAX_BYTES,
        Duration::from_secs(60),
    ));
    let monitor = Arc::new(HealthMonitor::new(registry.clone()));
    let verifier = Arc::new(TokenVerifier::new(SECRET.to_string(), 3_600, 86_400));
    (
        Fixture {
            registry,
            limiter,
            breakers,
            verifier,
        },
        balancer,
        cache,
        monitor,
    )
}

fn token_for(verifier: &TokenVerifier, role: Role) -> String {
    let principal = Principal {
        id: format!("{}-id", role.as_str()),
        username: role.as_str().to_string(),
        email: format!("{}@example.com", role.as_str()),
        roles: vec![role],
        permissions: vec![],
    };
    verifier.issue_pair(&principal).unwrap().access_token
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

fn route_body() -> Value {
    json!({
        "path": "/svc/things",
        "method": "GET",
        "targets": [{ "url": "http://127.0.0.1:9000" }],
        "health_check": { "enabled": false }
    })
}

macro_rules! admin_app {
    ($fx:expr, $balancer:expr, $cache:expr, $monitor:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from($fx.registry.clone()))
                .app_data(web::Data::from($fx.limiter.clone()))
                .app_data(web::Data::from($fx.breakers.clone()))
                .app_data(web::Data::from($balancer.clone()))
                .app_data(web::Data::from($cache.clone()))
                .app_data(web::Data::from($monitor.clone()))
                .wrap(Trace)
                .configure(|cfg| admin::configure_admin(cfg, $fx.verifier.clone())),
        )
        .await
    };
}

#[actix_web::test]
async fn admin_surface_requires_a_bearer() {
    let (fx, balancer, cache, monitor) = fixture();
    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::get()
        .uri("/admin/gateway/routes")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn regular_users_cannot_configure_routes() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::User);
    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::get()
        .uri("/admin/gateway/routes")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Access denied"));
}

#[actix_web::test]
async fn route_crud_through_the_admin_surface() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Admin);
    let app = admin_app!(fx, balancer, cache, monitor);

    // Create.
    let req = test::TestRequest::post()
        .uri("/admin/gateway/routes")
        .insert_header(bearer(&token))
        .set_json(route_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["route"]["path"], "/svc/things");

    // List.
    let req = test::TestRequest::get()
        .uri("/admin/gateway/routes")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["routes"].as_array().unwrap().len(), 1);

    // Fetch one.
    let req = test::TestRequest::get()
        .uri("/admin/gateway/routes/GET/svc/things")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // Delete, then delete again.
    let req = test::TestRequest::delete()
        .uri("/admin/gateway/routes/GET/svc/things")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::delete()
        .uri("/admin/gateway/routes/GET/svc/things")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn invalid_route_configs_are_400() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Admin);
    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::post()
        .uri("/admin/gateway/routes")
        .insert_header(bearer(&token))
        .set_json(json!({
            "path": "/svc/things",
            "method": "GET",
            "targets": []
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn moderators_can_view_stats_but_not_reset() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Moderator);
    let app = admin_app!(fx, balancer, cache, monitor);

    for uri in [
        "/admin/gateway/load-balancer/stats",
        "/admin/gateway/rate-limit/stats",
        "/admin/gateway/circuit-breaker/stats",
        "/admin/gateway/cache/stats",
        "/admin/gateway/health/stats",
    ] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "expected 200 for {}", uri);
    }

    let req = test::TestRequest::post()
        .uri("/admin/gateway/rate-limit/reset")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
async fn rate_limit_windows_can_be_inspected_and_removed() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Admin);

    // Seed one window out-of-band.
    fx.limiter.check(&RequestMeta {
        ip: "1.2.3.4".to_string(),
        user_id: None,
        path: "/x".to_string(),
        method: "GET".to_string(),
        user_agent: String::new(),
    });

    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::get()
        .uri("/admin/gateway/rate-limit/stats")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["active_windows"], 1);

    let req = test::TestRequest::delete()
        .uri("/admin/gateway/rate-limit/ip:1.2.3.4")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // Removing an absent key is a 404.
    let req = test::TestRequest::delete()
        .uri("/admin/gateway/rate-limit/ip:1.2.3.4")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn cache_and_breaker_maintenance() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Admin);

    cache.set(
        "http:GET:/x",
        sentra::services::cache::CachedResponse {
            status: 200,
            headers: vec![],
            body: b"x".to_vec(),
        },
        None,
    );

    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::delete()
        .uri("/admin/gateway/cache/http:GET:/x")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::delete()
        .uri("/admin/gateway/cache/http:GET:/x")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri("/admin/gateway/cache/clear")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/admin/gateway/circuit-breaker/reset")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/admin/gateway/load-balancer/reset")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn overview_summarizes_the_gateway() {
    let (fx, balancer, cache, monitor) = fixture();
    let token = token_for(&fx.verifier, Role::Admin);
    let app = admin_app!(fx, balancer, cache, monitor);

    let req = test::TestRequest::get()
        .uri("/admin/gateway/overview")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["routes"], 0);
    assert!(body["version"].as_str().is_some());
}
