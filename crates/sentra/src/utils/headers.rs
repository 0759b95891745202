//! Header hygiene shared by the forwarder and the pipeline.

/// Hop-by-hop headers (RFC 7230 §6.1) that an intermediary must not forward,
/// in either direction.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Drops hop-by-hop headers (and `Content-Length`, which is recomputed for
/// the rewritten body framing) from a collected header list.
pub fn strip_hop_by_hop(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("content-length"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_detection_is_case_insensitive() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn strip_removes_only_hop_by_hop_and_length() {
        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
            ("Content-Length".to_string(), "42".to_string()),
            ("X-Custom".to_string(), "1".to_string()),
        ];
        let kept = strip_hop_by_hop(&headers);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|(n, _)| n == "Content-Type"));
        assert!(kept.iter().any(|(n, _)| n == "X-Custom"));
    }
}
