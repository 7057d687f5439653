use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};

use crate::ApiError;

/// Boxed error for caller-supplied refresh procedures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type TokenAccessor = Arc<dyn Fn() -> Option<String> + Send + Sync>;
pub(crate) type RefreshFuture =
    Pin<Box<dyn Future<Output = Result<Option<String>, BoxError>> + Send>>;
pub(crate) type RefreshFn = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;
pub(crate) type ErrorObserver = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Per-client settings, immutable after [`crate::ApiClient::new`].
///
/// Shared by reference across every request the client issues.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) base_url: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) get_token: Option<TokenAccessor>,
    pub(crate) refresh: Option<RefreshFn>,
    pub(crate) on_error: Option<ErrorObserver>,
    pub(crate) timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            get_token: None,
            refresh: None,
            on_error: None,
            timeout: Duration::from_millis(15_000),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix for relative request paths.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds one default header. Defaults sit under caller and auth headers.
    pub fn header(mut self, name: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the default header set.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Credential accessor, read synchronously before each attempt.
    pub fn get_token<F>(mut self, get_token: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.get_token = Some(Arc::new(get_token));
        self
    }

    /// Asynchronous credential renewal, invoked at most once per logical
    /// request when a non-retried attempt comes back 401.
    ///
    /// Returning `Ok(None)`, an empty token, or `Err(_)` makes the original
    /// 401 surface as the request error; the refresh failure itself is never
    /// propagated.
    pub fn refresh<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
    {
        self.refresh = Some(Arc::new(move || Box::pin(refresh())));
        self
    }

    /// Side-channel failure observer, invoked exactly once per terminal
    /// request failure.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&ApiError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Per-request timeout. Default 15 000 ms.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-request timeout in milliseconds.
    pub fn timeout_ms(self, timeout_ms: u64) -> Self {
        self.timeout(Duration::from_millis(timeout_ms))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("get_token", &self.get_token.is_some())
            .field("refresh", &self.refresh.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ClientConfig;

    #[test]
    fn default_timeout_is_15_seconds() {
        assert_eq!(ClientConfig::default().timeout, Duration::from_millis(15_000));
    }

    #[test]
    fn builder_sets_fields() {
        let config = ClientConfig::new()
            .base_url("http://api.test")
            .timeout_ms(2_000)
            .get_token(|| Some("token".to_owned()));
        assert_eq!(config.base_url.as_deref(), Some("http://api.test"));
        assert_eq!(config.timeout, Duration::from_millis(2_000));
        assert!(config.get_token.is_some());
    }

    #[test]
    fn debug_does_not_expose_closures() {
        let config = ClientConfig::new().get_token(|| Some("secret".to_owned()));
        let debug = format!("{config:?}");
        assert!(debug.contains("get_token: true"));
        assert!(!debug.contains("secret"));
    }
}
