/// Returns whether a path is already an absolute `http://` / `https://` URL.
fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Joins a base address with a relative path.
///
/// Absolute paths pass through unchanged and the base is ignored. Otherwise
/// the base is right-trimmed of `/`, the path left-trimmed of `/`, and the
/// two joined with exactly one `/`.
pub(crate) fn join_url(base: Option<&str>, path: &str) -> String {
    let Some(base) = base else {
        return path.to_owned();
    };
    if is_absolute(path) {
        return path.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Appends a serialized query string to a URL.
///
/// Empty queries leave the URL untouched. The separator is `&` when the URL
/// already carries a query component, `?` otherwise (callers may pass paths
/// that embed their own query string).
pub(crate) fn append_query(url: String, query: &str) -> String {
    if query.is_empty() {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::{append_query, join_url};

    #[test]
    fn join_trims_slashes_to_exactly_one() {
        assert_eq!(
            join_url(Some("http://api.test/"), "/items"),
            "http://api.test/items"
        );
        assert_eq!(
            join_url(Some("http://api.test//"), "items"),
            "http://api.test/items"
        );
        assert_eq!(
            join_url(Some("http://api.test"), "items"),
            "http://api.test/items"
        );
    }

    #[test]
    fn absolute_path_ignores_base() {
        assert_eq!(
            join_url(Some("http://api.test"), "https://other.test/x"),
            "https://other.test/x"
        );
        assert_eq!(
            join_url(Some("http://api.test"), "HTTP://other.test/x"),
            "HTTP://other.test/x"
        );
    }

    #[test]
    fn missing_base_returns_path_unchanged() {
        assert_eq!(join_url(None, "/items"), "/items");
    }

    #[test]
    fn append_uses_question_mark_then_ampersand() {
        assert_eq!(
            append_query("http://a/items".to_owned(), "a=1"),
            "http://a/items?a=1"
        );
        assert_eq!(
            append_query("http://a/items?x=2".to_owned(), "a=1"),
            "http://a/items?x=2&a=1"
        );
    }

    #[test]
    fn append_empty_query_is_noop() {
        assert_eq!(append_query("http://a/items".to_owned(), ""), "http://a/items");
    }
}
