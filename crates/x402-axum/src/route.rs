//! Route matching for the x402 gate: `(method, pattern)` keys supporting
//! `*` (any single path segment) and `**` (any suffix, including zero
//! segments) wildcards, with a literal-method `*` matching any HTTP method.

use http::Method;

/// One segment of a parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    AnySuffix,
}

/// A `(method, pattern)` route key. `method` of `None` matches any method;
/// `pattern` is parsed once at registration time.
///
/// Pattern syntax: `/` separated segments. A segment of `*` matches exactly
/// one path segment; a trailing `**` matches zero or more remaining
/// segments (it must be the last segment in the pattern).
#[derive(Debug, Clone)]
pub struct RouteKey {
    method: Option<Method>,
    segments: Vec<Segment>,
}

impl RouteKey {
    /// Parses a route key. `method` of `"*"` (or `None`) matches any method.
    /// Panics if `pattern` places `**` anywhere but the final segment —
    /// callers are expected to pass a fixed, compile-time-known table.
    pub fn new(method: Option<&str>, pattern: &str) -> Self {
        let method = match method {
            None => None,
            Some("*") => None,
            Some(m) => Some(Method::from_bytes(m.as_bytes()).expect("invalid HTTP method")),
        };
        let segments = parse_pattern(pattern);
        Self { method, segments }
    }

    /// `true` if `method` and `path` both satisfy this route key.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if let Some(expected) = &self.method {
            if expected != method {
                return false;
            }
        }
        let path_segments: Vec<&str> = split_path(path);
        matches_segments(&self.segments, &path_segments)
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|s| match s {
            "*" => Segment::Any,
            "**" => Segment::AnySuffix,
            literal => Segment::Literal(literal.to_string()),
        })
        .collect()
}

fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn matches_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match (pattern.first(), path.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(Segment::AnySuffix), _) => true,
        (Some(Segment::Any), Some(_)) => matches_segments(&pattern[1..], &path[1..]),
        (Some(Segment::Any), None) => false,
        (Some(Segment::Literal(l)), Some(p)) if l == p => {
            matches_segments(&pattern[1..], &path[1..])
        }
        (Some(Segment::Literal(_)), _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_literal_path_matches() {
        let key = RouteKey::new(Some("GET"), "/health");
        assert!(key.matches(&Method::GET, "/health"));
        assert!(!key.matches(&Method::GET, "/healthz"));
        assert!(!key.matches(&Method::POST, "/health"));
    }

    #[test]
    fn any_segment_wildcard_matches_single_segment() {
        let key = RouteKey::new(Some("GET"), "/users/*/profile");
        assert!(key.matches(&Method::GET, "/users/42/profile"));
        assert!(!key.matches(&Method::GET, "/users/42/43/profile"));
        assert!(!key.matches(&Method::GET, "/users/profile"));
    }

    #[test]
    fn any_suffix_wildcard_matches_zero_or_more_segments() {
        let key = RouteKey::new(Some("GET"), "/api/**");
        assert!(key.matches(&Method::GET, "/api"));
        assert!(key.matches(&Method::GET, "/api/v1"));
        assert!(key.matches(&Method::GET, "/api/v1/resource/42"));
        assert!(!key.matches(&Method::GET, "/other"));
    }

    #[test]
    fn method_wildcard_matches_any_method() {
        let key = RouteKey::new(Some("*"), "/paid");
        assert!(key.matches(&Method::GET, "/paid"));
        assert!(key.matches(&Method::POST, "/paid"));
    }

    #[test]
    fn none_method_matches_any_method() {
        let key = RouteKey::new(None, "/paid");
        assert!(key.matches(&Method::GET, "/paid"));
        assert!(key.matches(&Method::DELETE, "/paid"));
    }
}
