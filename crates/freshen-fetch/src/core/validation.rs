/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Examples
///
/// ```
/// use freshen_fetch::core::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(300));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(304));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 300 | 301 | 302 | 303 | 307 | 308)
}

/// Full or partial content.
pub fn is_success(status: u16) -> bool {
    matches!(status, 200 | 206)
}

/// Last non-empty path segment of a URL.
pub fn url_file_name(url: &url::Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
}
