use actix_web::middleware::DefaultHeaders;

/// Security headers applied to every response.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ))
}

/// CORS headers for the configured origin, with credentials allowed.
pub fn cors_headers(origin: &str) -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", origin.to_string()))
        .add(("Access-Control-Allow-Credentials", "true"))
        .add((
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, PATCH, OPTIONS",
        ))
        .add((
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Trace-Id",
        ))
}
