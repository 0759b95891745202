//! # Sentra API Gateway
//!
//! An async HTTP API gateway built with Rust and Actix Web: route matching
//! with runtime reconfiguration, load balancing across replicas, active
//! health monitoring, circuit breaking, fixed-window rate limiting, response
//! caching and a JWT/RBAC admission pipeline guarding both proxied traffic
//! and the administrative surface.
//!
//! ## Request flow
//!
//! ```text
//! Client ──▶ trace id ──▶ rate limiter ──▶ cache (GET) ──▶ route match
//!                 │                                            │
//!                 ▼                                            ▼
//!            X-Trace-Id                     healthy replicas ─▶ balancer pick
//!                                                              │
//!                                         circuit breaker ─▶ forwarder ──▶ upstream
//! ```
//!
//! ## Module organization
//!
//! - [`auth`] - token verification, RBAC, credentials
//! - [`config`] - environment-derived settings
//! - [`models`] - domain types, routes, errors
//! - [`services`] - the forwarding core (registry, balancer, breaker,
//!   limiter, cache, monitor, forwarder, pipeline)
//! - [`routes`] - built-in HTTP endpoints and the proxy catch-all
//! - [`middleware`] - trace, rate limit, security headers, admission
//! - [`utils`] - path/pattern/header helpers
//! - [`logs`] - logger setup

pub mod auth;
pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
