//! Core gateway services.
//!
//! These are the process-wide singletons composed by the request pipeline:
//!
//! - [`registry`] - routes and replica health state
//! - [`load_balancer`] - replica selection policies
//! - [`circuit_breaker`] - per-(route, replica) failure-window breakers
//! - [`rate_limiter`] - fixed-window admission control
//! - [`cache`] - bounded LRU/TTL response cache
//! - [`health_monitor`] - active replica probing
//! - [`forwarder`] - the upstream HTTP call with timeout and retry
//! - [`pipeline`] - the dispatch loop tying it all together
//!
//! Every service guards its state with a short critical section that is
//! never held across I/O; the suspension points of a dispatch are the
//! upstream call, retry backoff sleeps and cache producers.

pub mod cache;
pub mod circuit_breaker;
pub mod forwarder;
pub mod health_monitor;
pub mod load_balancer;
pub mod pipeline;
pub mod rate_limiter;
pub mod registry;
