//! Catch-all dispatch into the request pipeline.
//!
//! Anything that is not a built-in endpoint (health, metrics, auth, admin)
//! falls through to the pipeline for route matching and forwarding.

use crate::services::pipeline::RequestPipeline;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;

pub fn configure_proxy(cfg: &mut web::ServiceConfig, pipeline: Arc<RequestPipeline>) {
    cfg.default_service(web::route().to(
        move |req: HttpRequest, body: web::Bytes| {
            let pipeline = pipeline.clone();
            async move { pipeline.handle(req, body).await }
        },
    ));
}
