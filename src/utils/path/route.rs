//! URL path utilities for sitemap routes.

use percent_encoding::percent_decode_str;

/// Normalize a configured base path to `/segment/` form.
///
/// ```ignore
/// normalize_base_path("")      // "/"
/// normalize_base_path("fr")    // "/fr/"
/// normalize_base_path("/fr")   // "/fr/"
/// ```
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Split a request URL into its decoded path and raw query string.
///
/// Returns `None` when the path is not valid UTF-8 after decoding or tries
/// to climb out of the site root.
pub fn decode_request_path(url: &str) -> Option<(String, Option<&str>)> {
    let (raw_path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };
    let decoded = percent_decode_str(raw_path).decode_utf8().ok()?;
    if decoded.split('/').any(|segment| segment == "..") {
        return None;
    }
    let path = if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        format!("/{decoded}")
    };
    Some((path, query))
}

/// Look up a single query parameter value (first occurrence wins).
pub fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(normalize_base_path("/"), "/");
        assert_eq!(normalize_base_path("fr"), "/fr/");
        assert_eq!(normalize_base_path("/fr"), "/fr/");
        assert_eq!(normalize_base_path("/shop/de/"), "/shop/de/");
    }

    #[test]
    fn test_decode_request_path() {
        let (path, query) = decode_request_path("/sitemap.xml?page=2").unwrap();
        assert_eq!(path, "/sitemap.xml");
        assert_eq!(query, Some("page=2"));

        let (path, query) = decode_request_path("/caf%C3%A9/sitemap.xml").unwrap();
        assert_eq!(path, "/café/sitemap.xml");
        assert_eq!(query, None);
    }

    #[test]
    fn test_decode_request_path_rejects_traversal() {
        assert!(decode_request_path("/../etc/passwd").is_none());
        assert!(decode_request_path("/%2E%2E/secret").is_none());
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("page=3"), "page"), Some("3"));
        assert_eq!(query_param(Some("a=1&page=7&page=8"), "page"), Some("7"));
        assert_eq!(query_param(Some("page"), "page"), Some(""));
        assert_eq!(query_param(Some("a=1"), "page"), None);
        assert_eq!(query_param(None, "page"), None);
    }
}
