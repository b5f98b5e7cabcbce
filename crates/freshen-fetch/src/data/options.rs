use std::sync::Arc;
use std::time::Duration;

/// Batch-wide knobs for fetching.
///
/// # Examples
///
/// ```
/// use freshen_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_attempts(5)
///     .retry_backoff(Duration::from_millis(200))
///     .header("User-Agent", "freshen");
/// ```
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Total attempts of the transfer phase, first one included.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Base delay for exponential backoff; retry `n` waits `retry_backoff * 2^n`.
    ///
    /// Default: 500ms
    pub retry_backoff: Duration,

    /// Headers sent with every request of the fetch, on top of session headers.
    pub headers: Arc<[(String, String)]>,

    /// Redirect hops followed before giving up.
    ///
    /// Default: 20
    pub max_redirects: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            headers: Arc::new([]),
            max_redirects: 20,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = headers.into();
        self
    }

    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut merged: Vec<_> = self.headers.iter().cloned().collect();
        merged.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.headers = merged.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = FetchOptions::default()
            .max_attempts(0)
            .header("A", "1")
            .headers([("B", "2")]);
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.headers.len(), 2);
        assert_eq!(options.headers[1], ("B".to_string(), "2".to_string()));
    }
}
