use actix_web::http::header::HeaderMap;

/// Resolves the upstream URL for a forwarded request: the replica base URL,
/// the request path and the original query string.
pub fn build_upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), path);
    if let Some(q) = query {
        if !q.is_empty() {
            url.push('?');
            url.push_str(q);
        }
    }
    url
}

/// Client IP used for rate limiting: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the transport peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<&str>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    peer.unwrap_or("unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    #[test]
    fn upstream_url_joins_cleanly() {
        assert_eq!(
            build_upstream_url("http://backend:8080/", "/api/users", None),
            "http://backend:8080/api/users"
        );
        assert_eq!(
            build_upstream_url("http://backend:8080", "/api/users", Some("page=2")),
            "http://backend:8080/api/users?page=2"
        );
        assert_eq!(
            build_upstream_url("http://backend:8080", "/api/users", Some("")),
            "http://backend:8080/api/users"
        );
    }

    #[test]
    fn ip_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("1.2.3.4, 10.0.0.1"),
        );
        headers.insert(
            HeaderName::from_static("x-real-ip"),
            HeaderValue::from_static("5.6.7.8"),
        );
        assert_eq!(client_ip(&headers, Some("9.9.9.9")), "1.2.3.4");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, Some("9.9.9.9")), "5.6.7.8");

        headers.remove("x-real-ip");
        assert_eq!(client_ip(&headers, Some("9.9.9.9")), "9.9.9.9");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
