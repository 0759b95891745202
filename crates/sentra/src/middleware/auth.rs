//! Bearer-token admission middleware.
//!
//! Wraps non-public resources: extracts the `Authorization: Bearer` token,
//! verifies it and injects the resulting [`Principal`] into the request
//! extensions for handlers and the authorizer. Role and permission
//! predicates are enforced by the handlers themselves, not here.

use crate::auth::token::TokenVerifier;
use crate::middleware::trace::TraceId;
use crate::models::error::GatewayError;
use crate::models::principal::Principal;
use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

pub struct JwtAuth {
    verifier: Arc<TokenVerifier>,
}

impl JwtAuth {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = JwtAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtAuthMiddleware {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        })
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    verifier: Arc<TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
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
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let verified: Result<Principal, GatewayError> =
                extract_bearer(&req).and_then(|token| verifier.verify(&token));

            match verified {
                Ok(principal) => {
                    debug!("authenticated request for {}", principal.username);
                    req.extensions_mut().insert(principal);
                    let res = service.call(req).await?;
                    Ok(res.map_into_boxed_body())
                }
                Err(error) => {
                    warn!("admission rejected: {}", error);
                    let trace_id = req
                        .extensions()
                        .get::<TraceId>()
                        .map(|t| t.0.clone())
                        .unwrap_or_else(|| Uuid::new_v4().to_string());
                    Ok(req.into_response(error.to_response(&trace_id)))
                }
            }
        })
    }
}

/// Pulls the bearer portion out of the `Authorization` header. The `Bearer`
/// scheme prefix is case-sensitive. Shared with the dispatch pipeline,
/// which performs the same admission for proxied routes.
pub fn bearer_token(
    headers: &actix_web::http::header::HeaderMap,
) -> Result<String, GatewayError> {
    let header = headers
        .get("Authorization")
        .ok_or_else(|| GatewayError::unauthorized("Authentication required"))?;

    let value = header
        .to_str()
        .map_err(|_| GatewayError::unauthorized("Invalid Authorization header"))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| GatewayError::unauthorized("Authorization header must use Bearer scheme"))?;

    Ok(token.to_string())
}

fn extract_bearer(req: &ServiceRequest) -> Result<String, GatewayError> {
    bearer_token(req.headers())
}
