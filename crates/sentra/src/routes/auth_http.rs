//! Built-in authentication endpoints under `/api/v1/auth`.
//!
//! `register` and `login` are public; `profile` and `admin-only` sit behind
//! the bearer admission middleware. `refresh` exchanges a valid refresh
//! token for a new access token.

use crate::auth::password::validate_registration;
use crate::auth::rbac::{self, AuthLogic};
use crate::auth::token::TokenVerifier;
use crate::auth::users::UserStore;
use crate::middleware::auth::JwtAuth;
use crate::middleware::trace::trace_id;
use crate::models::error::GatewayError;
use crate::models::principal::{Principal, Role};
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

pub async fn register(
    req: HttpRequest,
    body: web::Json<RegisterRequest>,
    users: web::Data<UserStore>,
    verifier: web::Data<TokenVerifier>,
) -> HttpResponse {
    let trace = trace_id(&req);

    let issues = validate_registration(
        &body.username,
        &body.email,
        &body.password,
        &body.confirm_password,
    );
    if !issues.is_empty() {
        return GatewayError::Validation { issues }.to_response(&trace);
    }

    let user = match users.register(&body.username, &body.email, &body.password) {
        Ok(user) => user,
        Err(error) => return error.to_response(&trace),
    };

    info!("user registered: {}", user.username);
    match verifier.issue_pair(&user.to_principal()) {
        Ok(tokens) => HttpResponse::Created().json(json!({
            "message": "User registered",
            "user": user,
            "tokens": tokens,
        })),
        Err(error) => error.to_response(&trace),
    }
}

pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    users: web::Data<UserStore>,
    verifier: web::Data<TokenVerifier>,
) -> HttpResponse {
    let trace = trace_id(&req);

    let Some(user) = users.verify_credentials(&body.username, &body.password) else {
        return GatewayError::unauthorized("Invalid username or password").to_response(&trace);
    };

    info!("user logged in: {}", user.username);
    match verifier.issue_pair(&user.to_principal()) {
        Ok(tokens) => HttpResponse::Ok().json(json!({
            "message": "Login successful",
            "user": user,
            "tokens": tokens,
        })),
        Err(error) => error.to_response(&trace),
    }
}

pub async fn refresh(
    req: HttpRequest,
    body: web::Json<RefreshRequest>,
    verifier: web::Data<TokenVerifier>,
) -> HttpResponse {
    let trace = trace_id(&req);
    match verifier.refresh(&body.refresh_token, None) {
        Ok(access_token) => HttpResponse::Ok().json(json!({
            "message": "Token refreshed",
            "accessToken": access_token,
        })),
        Err(error) => error.to_response(&trace),
    }
}

pub async fn profile(req: HttpRequest) -> HttpResponse {
    let trace = trace_id(&req);
    let Some(principal) = current_principal(&req) else {
        return GatewayError::unauthorized("Authentication required").to_response(&trace);
    };

    let permissions: Vec<&str> = rbac::effective_permissions(&principal)
        .iter()
        .map(|p| p.as_str())
        .collect();
    HttpResponse::Ok().json(json!({
        "message": "Profile",
        "user": {
            "id": principal.id,
            "username": principal.username,
            "email": principal.email,
            "roles": principal.roles,
            "permissions": permissions,
        }
    }))
}

pub async fn admin_only(req: HttpRequest) -> HttpResponse {
    let trace = trace_id(&req);
    let Some(principal) = current_principal(&req) else {
        return GatewayError::unauthorized("Authentication required").to_response(&trace);
    };

    if let Err(error) = rbac::authorize(&principal, &[Role::Admin], &[], AuthLogic::Any) {
        return error.to_response(&trace);
    }

    HttpResponse::Ok().json(json!({
        "message": "Welcome, administrator",
        "user": principal.username,
    }))
}

pub(crate) fn current_principal(req: &HttpRequest) -> Option<Principal> {
    use actix_web::HttpMessage;
    req.extensions().get::<Principal>().cloned()
}

/// Configures the auth endpoints; the protected ones are wrapped with the
/// bearer admission middleware.
pub fn configure_auth(cfg: &mut web::ServiceConfig, verifier: Arc<TokenVerifier>) {
    cfg.service(
        web::scope("/api/v1/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .service(
                web::resource("/profile")
                    .wrap(JwtAuth::new(verifier.clone()))
                    .route(web::get().to(profile)),
            )
            .service(
                web::resource("/admin-only")
                    .wrap(JwtAuth::new(verifier))
                    .route(web::get().to(admin_only)),
            ),
    );
}
