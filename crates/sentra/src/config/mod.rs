//! Configuration management for the sentra gateway.
//!
//! All runtime configuration comes from environment variables with safe
//! defaults; see [`settings::load_settings`] for the full variable set.
//! Route definitions themselves are not part of this module: they live in
//! the route registry and are mutated at runtime through the admin surface.

pub mod settings;
