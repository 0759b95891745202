//! Authentication and authorization for the gateway.
//!
//! The admission pipeline is: bearer extraction → [`token::TokenVerifier`]
//! producing a [`crate::models::principal::Principal`] → [`rbac::authorize`]
//! for role/permission predicates. [`password`] and [`users`] back the
//! built-in register/login endpoints.

pub mod password;
pub mod rbac;
pub mod token;
pub mod users;
