//! Path pattern matching for route definitions.
//!
//! Patterns are plain paths whose segments may be parameters (`:name`,
//! matching exactly one non-empty segment) or a trailing `*` wildcard
//! matching any suffix. Matching never looks at the query string.

/// True when the path contains parameter or wildcard segments.
pub fn is_pattern(path: &str) -> bool {
    path.split('/').any(|seg| seg.starts_with(':') || seg == "*")
}

/// Matches a request path against a pattern.
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();

    for (i, seg) in pattern_segments.iter().enumerate() {
        if *seg == "*" {
            // Trailing wildcard swallows the remaining suffix.
            return true;
        }
        match path_segments.get(i) {
            Some(actual) => {
                if seg.starts_with(':') {
                    if actual.is_empty() {
                        return false;
                    }
                } else if seg != actual {
                    return false;
                }
            }
            None => return false,
        }
    }

    pattern_segments.len() == path_segments.len()
}

/// Length of the literal prefix of a pattern, up to the first parameter or
/// wildcard segment. Used to prefer more specific patterns on overlap.
pub fn literal_prefix_len(pattern: &str) -> usize {
    let mut len = 0;
    for seg in pattern.split('/') {
        if seg.starts_with(':') || seg == "*" {
            break;
        }
        len += seg.len() + 1;
    }
    len
}

/// Number of parameter/wildcard segments, used as a tie-break: fewer
/// placeholders means more specific.
pub fn placeholder_count(pattern: &str) -> usize {
    pattern
        .split('/')
        .filter(|seg| seg.starts_with(':') || *seg == "*")
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_match_exactly() {
        assert!(matches("/api/users", "/api/users"));
        assert!(!matches("/api/users", "/api/users/1"));
        assert!(!matches("/api/users", "/api"));
    }

    #[test]
    fn params_match_single_segments() {
        assert!(matches("/api/users/:id", "/api/users/42"));
        assert!(matches("/api/users/:id/posts/:post", "/api/users/42/posts/7"));
        assert!(!matches("/api/users/:id", "/api/users"));
        assert!(!matches("/api/users/:id", "/api/users/42/extra"));
        assert!(!matches("/api/users/:id", "/api/users/"));
    }

    #[test]
    fn trailing_wildcard_matches_any_suffix() {
        assert!(matches("/files/*", "/files/a"));
        assert!(matches("/files/*", "/files/a/b/c"));
        assert!(matches("/files/*", "/files"));
        assert!(!matches("/files/*", "/other/a"));
    }

    #[test]
    fn specificity_helpers() {
        assert!(literal_prefix_len("/api/users/list") > literal_prefix_len("/api/users/:id"));
        assert!(literal_prefix_len("/api/users/:id") > literal_prefix_len("/api/:res"));
        assert_eq!(placeholder_count("/api/users/:id"), 1);
        assert_eq!(placeholder_count("/api/:res/*"), 2);
    }

    #[test]
    fn pattern_detection() {
        assert!(is_pattern("/api/users/:id"));
        assert!(is_pattern("/files/*"));
        assert!(!is_pattern("/api/users"));
    }
}
