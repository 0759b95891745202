use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

/// A single field-level validation problem, reported back to the client
/// inside the `issues` array of a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error taxonomy for the gateway.
///
/// Every variant maps to exactly one HTTP status. Client-facing messages come
/// from the `Display` implementation, which is deliberately free of upstream
/// URLs and internal detail; anything operators need goes to the log instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Access denied: {message}")]
    Forbidden { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Validation failed")]
    Validation { issues: Vec<FieldIssue> },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("No route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Too many requests")]
    RateLimited { retry_after: u64 },

    #[error("{message}")]
    BadGateway { message: String },

    #[error("Upstream did not respond within {timeout_ms} ms")]
    GatewayTimeout { timeout_ms: u64 },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable {
        retry_after: u64,
        /// Configured fallback body served while the circuit is open.
        fallback: Option<serde_json::Value>,
    },

    #[error("Internal server error")]
    Internal { message: String },
}

impl GatewayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } | Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON error response for this error, stamped with the
    /// request's trace id. All failure bodies share the same envelope:
    /// `message`, `statusCode`, `traceId`, plus `retryAfter` for 429/503 and
    /// `issues` for validation failures.
    pub fn to_response(&self, trace_id: &str) -> HttpResponse {
        let status = self.status();
        let mut body = json!({
            "message": self.to_string(),
            "statusCode": status.as_u16(),
            "traceId": trace_id,
        });

        match self {
            Self::Validation { issues } => {
                body["issues"] = json!(issues);
            }
            Self::RateLimited { retry_after } => {
                body["retryAfter"] = json!(retry_after);
            }
            Self::ServiceUnavailable {
                retry_after,
                fallback,
            } => {
                // The configured fallback overlays the envelope; the
                // envelope fields are re-stamped so they cannot be lost.
                if let Some(serde_json::Value::Object(extra)) = fallback {
                    for (key, value) in extra {
                        body[key.as_str()] = value.clone();
                    }
                }
                body["retryAfter"] = json!(retry_after);
                body["statusCode"] = json!(status.as_u16());
                body["traceId"] = json!(trace_id);
            }
            _ => {}
        }

        let mut builder = HttpResponse::build(status);
        if let Self::RateLimited { retry_after }
        | Self::ServiceUnavailable { retry_after, .. } = self
        {
            builder.insert_header(("Retry-After", retry_after.to_string()));
        }
        builder.json(body)
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        // Fallback path for errors propagated with `?` outside a handler that
        // threads the trace id explicitly. A fresh id still lets the failure
        // be correlated with the access log.
        self.to_response(&uuid::Uuid::new_v4().to_string())
    }
}
