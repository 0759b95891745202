//! HTTP route handlers and endpoint wiring.
//!
//! Built-in surfaces: [`health`] (liveness probes), [`metrics`] (plain-text
//! counters), [`auth_http`] (register/login/refresh/profile), [`admin`] (the
//! runtime configuration surface under `/admin/gateway`). Everything else
//! falls through [`proxy`] into the dispatch pipeline.

pub mod admin;
pub mod auth_http;
pub mod health;
pub mod metrics;
pub mod proxy;
