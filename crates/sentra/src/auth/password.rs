//! Argon2id credential hashing and the registration validation schemas.

use crate::models::error::FieldIssue;
use crate::models::settings::Settings;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").expect("username regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex")
});

/// Trivial values a password may not equal, case-insensitive. Matching is
/// whole-value: strong passwords that merely contain one of these stay valid.
const BANNED_PASSWORDS: &[&str] = &["123", "abc", "qwe", "password", "admin"];

/// Builds an Argon2id hasher from the configured cost parameters.
pub fn argon2_from(settings: &Settings) -> Argon2<'static> {
    let params = Params::new(
        settings.argon2_memory_cost,
        settings.argon2_time_cost,
        settings.argon2_parallelism,
        None,
    )
    .unwrap_or_default();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

pub fn hash_password(argon: &Argon2<'_>, password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    argon
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format!("password hashing failed: {}", e))
}

/// Constant-time verification against a stored PHC-format hash.
pub fn verify_password(argon: &Argon2<'_>, password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => argon.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub fn validate_username(username: &str) -> Option<FieldIssue> {
    if USERNAME_RE.is_match(username) {
        None
    } else {
        Some(FieldIssue::new(
            "username",
            "must be 3-50 characters of letters, digits, underscore or dash",
        ))
    }
}

pub fn validate_email(email: &str) -> Option<FieldIssue> {
    if email.len() <= 254 && EMAIL_RE.is_match(email) {
        None
    } else {
        Some(FieldIssue::new("email", "must be a valid email address"))
    }
}

/// Applies the password policy: 8-128 characters with upper, lower, digit
/// and special, no run of three identical characters, none of the banned
/// sequences.
pub fn validate_password(password: &str) -> Vec<FieldIssue> {
    let mut issues = Vec::new();

    if password.len() < 8 || password.len() > 128 {
        issues.push(FieldIssue::new("password", "must be 8-128 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(FieldIssue::new(
            "password",
            "must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        issues.push(FieldIssue::new(
            "password",
            "must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(FieldIssue::new("password", "must contain a digit"));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        issues.push(FieldIssue::new(
            "password",
            "must contain a special character",
        ));
    }
    if has_identical_run(password, 3) {
        issues.push(FieldIssue::new(
            "password",
            "must not repeat the same character three times in a row",
        ));
    }
    let lowered = password.to_lowercase();
    if BANNED_PASSWORDS.iter().any(|s| lowered == *s) {
        issues.push(FieldIssue::new("password", "is a commonly used password"));
    }

    issues
}

fn has_identical_run(value: &str, run: usize) -> bool {
    let chars: Vec<char> = value.chars().collect();
    chars.windows(run).any(|w| w.iter().all(|c| *c == w[0]))
}

/// Validates a full registration request, returning every field issue found.
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if let Some(issue) = validate_username(username) {
        issues.push(issue);
    }
    if let Some(issue) = validate_email(email) {
        issues.push(issue);
    }
    issues.extend(validate_password(password));
    if password != confirm_password {
        issues.push(FieldIssue::new("confirmPassword", "passwords do not match"));
    }
    issues
}
