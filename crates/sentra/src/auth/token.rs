//! JWT issuance and verification.
//!
//! Access and refresh tokens are compact HS256 JWTs signed with the
//! process-wide secret. Refresh tokens carry `type=refresh` and are only
//! accepted by the refresh exchange, never for admission.

use crate::models::error::GatewayError;
use crate::models::principal::{Permission, Principal, Role};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(rename = "type", default = "default_token_type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

fn default_token_type() -> String {
    TOKEN_TYPE_ACCESS.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateless verifier/issuer around the signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenVerifier {
    pub fn new(secret: String, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            secret,
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Issues an access/refresh token pair for the given principal.
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, GatewayError> {
        Ok(TokenPair {
            access_token: self.issue(principal, TOKEN_TYPE_ACCESS, self.access_ttl_secs)?,
            refresh_token: self.issue(principal, TOKEN_TYPE_REFRESH, self.refresh_ttl_secs)?,
        })
    }

    fn issue(
        &self,
        principal: &Principal,
        token_type: &str,
        ttl_secs: u64,
    ) -> Result<String, GatewayError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal.id.clone(),
            username: principal.username.clone(),
            email: principal.email.clone(),
            roles: principal.roles.clone(),
            permissions: principal.permissions.clone(),
            token_type: token_type.to_string(),
            iat: now,
            exp: now + ttl_secs as i64,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| GatewayError::internal(format!("token signing failed: {}", e)))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, GatewayError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| invalid_token())
    }

    /// Validates a bearer token and produces the authenticated principal.
    ///
    /// All failure modes (bad signature, expired, malformed payload, refresh
    /// token presented for admission) collapse into the same opaque error.
    pub fn verify(&self, token: &str) -> Result<Principal, GatewayError> {
        let claims = self.decode_claims(token)?;
        if claims.token_type == TOKEN_TYPE_REFRESH {
            return Err(invalid_token());
        }
        if claims.sub.is_empty() || claims.username.is_empty() {
            return Err(invalid_token());
        }
        Ok(Principal {
            id: claims.sub,
            username: claims.username,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
        })
    }

    /// Exchanges a valid refresh token for a fresh short-lived access token.
    ///
    /// When `expected_sub` is given it must match the refresh token's
    /// subject.
    pub fn refresh(
        &self,
        refresh_token: &str,
        expected_sub: Option<&str>,
    ) -> Result<String, GatewayError> {
        let claims = self.decode_claims(refresh_token)?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(invalid_token());
        }
        if claims.sub.is_empty() || claims.username.is_empty() {
            return Err(invalid_token());
        }
        if let Some(expected) = expected_sub {
            if expected != claims.sub {
                return Err(GatewayError::unauthorized("Refresh token subject mismatch"));
            }
        }
        let principal = Principal {
            id: claims.sub,
            username: claims.username,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
        };
        self.issue(&principal, TOKEN_TYPE_ACCESS, self.access_ttl_secs)
    }
}

fn invalid_token() -> GatewayError {
    GatewayError::unauthorized("Invalid or expired token")
}
