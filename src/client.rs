use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::{
    decode::decode_response,
    url::{append_query, join_url},
    ApiError, Body, ClientConfig, Query, RequestScope, ResponseBody, Result,
};

/// Verb-dependent request payload.
///
/// Read verbs (GET, DELETE) consume [`Payload::Query`]; write verbs (POST,
/// PUT, PATCH) consume [`Payload::Body`]. A payload of the other kind is
/// ignored for that verb.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    #[default]
    None,
    Query(Query),
    Body(Body),
}

impl From<Query> for Payload {
    fn from(query: Query) -> Self {
        Self::Query(query)
    }
}

impl From<Body> for Payload {
    fn from(body: Body) -> Self {
        Self::Body(body)
    }
}

/// Per-call overrides for a single request.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) scope: Option<RequestScope>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one header override. Overrides replace default headers of the
    /// same name and suppress auth injection for `Authorization`.
    pub fn header(mut self, name: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the header override set.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// External cancellation token; cancelling it aborts the request with
    /// status 499. A token that is already cancelled aborts before the
    /// transport is invoked.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Registers every attempt of this request in the given scope so it can
    /// be bulk-cancelled via [`RequestScope::cancel_all`].
    pub fn scope(mut self, scope: RequestScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Outcome of one transport-level attempt.
enum AttemptOutcome {
    Success(ResponseBody),
    HttpError { status: u16, data: Option<ResponseBody> },
    Network { message: String },
    Cancelled,
}

/// Async HTTP API client with bearer-token injection, one-shot refresh
/// retry, and per-request timeout/cancellation.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET with query parameters.
    pub async fn get<Q: Into<Query>>(&self, path: &str, query: Q) -> Result<ResponseBody> {
        self.request(Method::GET, path, Payload::Query(query.into()), RequestOptions::new())
            .await
    }

    /// GET with query parameters and per-call overrides.
    pub async fn get_with<Q: Into<Query>>(
        &self,
        path: &str,
        query: Q,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        self.request(Method::GET, path, Payload::Query(query.into()), options)
            .await
    }

    /// DELETE with query parameters.
    pub async fn delete<Q: Into<Query>>(&self, path: &str, query: Q) -> Result<ResponseBody> {
        self.request(
            Method::DELETE,
            path,
            Payload::Query(query.into()),
            RequestOptions::new(),
        )
        .await
    }

    /// DELETE with query parameters and per-call overrides.
    pub async fn delete_with<Q: Into<Query>>(
        &self,
        path: &str,
        query: Q,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        self.request(Method::DELETE, path, Payload::Query(query.into()), options)
            .await
    }

    /// POST with a request body.
    pub async fn post<B: Into<Body>>(&self, path: &str, body: B) -> Result<ResponseBody> {
        self.request(Method::POST, path, Payload::Body(body.into()), RequestOptions::new())
            .await
    }

    /// POST with a request body and per-call overrides.
    pub async fn post_with<B: Into<Body>>(
        &self,
        path: &str,
        body: B,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        self.request(Method::POST, path, Payload::Body(body.into()), options)
            .await
    }

    /// PUT with a request body.
    pub async fn put<B: Into<Body>>(&self, path: &str, body: B) -> Result<ResponseBody> {
        self.request(Method::PUT, path, Payload::Body(body.into()), RequestOptions::new())
            .await
    }

    /// PUT with a request body and per-call overrides.
    pub async fn put_with<B: Into<Body>>(
        &self,
        path: &str,
        body: B,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        self.request(Method::PUT, path, Payload::Body(body.into()), options)
            .await
    }

    /// PATCH with a request body.
    pub async fn patch<B: Into<Body>>(&self, path: &str, body: B) -> Result<ResponseBody> {
        self.request(Method::PATCH, path, Payload::Body(body.into()), RequestOptions::new())
            .await
    }

    /// PATCH with a request body and per-call overrides.
    pub async fn patch_with<B: Into<Body>>(
        &self,
        path: &str,
        body: B,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        self.request(Method::PATCH, path, Payload::Body(body.into()), options)
            .await
    }

    /// Runs one logical request: at most two attempts (original plus one
    /// refresh retry), resolving to the decoded body or exactly one
    /// [`ApiError`]. The configured error observer fires once, on the
    /// terminal failure only.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<ResponseBody> {
        let outcome = self.run(method, path, &payload, &options).await;
        if let Err(err) = &outcome {
            tracing::warn!(status = err.status(), url = err.url(), "request failed");
            if let Some(on_error) = &self.config.on_error {
                on_error(err);
            }
        }
        outcome
    }

    async fn run(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
        options: &RequestOptions,
    ) -> Result<ResponseBody> {
        let url = self.compose_url(&method, path, payload);
        tracing::debug!(%method, %url, "dispatching request");

        let mut refreshed: Option<String> = None;
        let mut is_retry = false;
        loop {
            let attempt = self
                .attempt(&method, &url, payload, options, refreshed.as_deref())
                .await;
            match attempt {
                AttemptOutcome::Success(body) => return Ok(body),
                AttemptOutcome::Network { message } => {
                    return Err(ApiError::Network { url, message })
                }
                AttemptOutcome::Cancelled => return Err(ApiError::Cancelled { url }),
                AttemptOutcome::HttpError { status, data } => {
                    if status == 401 && !is_retry {
                        if let Some(refresh) = &self.config.refresh {
                            tracing::debug!(%url, "unauthorized, refreshing credential");
                            match refresh().await {
                                Ok(Some(token)) if !token.is_empty() => {
                                    refreshed = Some(token);
                                    is_retry = true;
                                    continue;
                                }
                                Ok(_) => {
                                    tracing::debug!("refresh yielded no credential");
                                }
                                Err(err) => {
                                    // Refresh failures are swallowed; the
                                    // original 401 is what surfaces.
                                    tracing::debug!(error = %err, "refresh failed");
                                }
                            }
                        }
                    }
                    return Err(ApiError::Http { status, url, data });
                }
            }
        }
    }

    fn compose_url(&self, method: &Method, path: &str, payload: &Payload) -> String {
        let url = join_url(self.config.base_url.as_deref(), path);
        if !is_read_verb(method) {
            return url;
        }
        match payload {
            Payload::Query(query) => append_query(url, &query.serialize()),
            _ => url,
        }
    }

    /// One transport-level attempt: build headers and body, inject auth, arm
    /// the timeout, race transport + decode against cancellation.
    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        payload: &Payload,
        options: &RequestOptions,
        refreshed: Option<&str>,
    ) -> AttemptOutcome {
        let mut headers = self.config.headers.clone();
        for (name, value) in options.headers.iter() {
            headers.insert(name, value.clone());
        }

        let mut builder = self.http.request(method.clone(), url);
        if !is_read_verb(method) {
            if let Payload::Body(body) = payload {
                builder = match body {
                    Body::Empty => builder,
                    Body::Json(value) => {
                        if !headers.contains_key(CONTENT_TYPE) {
                            headers.insert(
                                CONTENT_TYPE,
                                HeaderValue::from_static("application/json"),
                            );
                        }
                        match serde_json::to_vec(value) {
                            Ok(bytes) => builder.body(bytes),
                            Err(err) => {
                                return AttemptOutcome::Network {
                                    message: format!("failed to serialize json body: {err}"),
                                }
                            }
                        }
                    }
                    Body::Bytes(bytes) => builder.body(bytes.clone()),
                    Body::Form(form) => match form.to_multipart() {
                        Ok(form) => builder.multipart(form),
                        Err(message) => return AttemptOutcome::Network { message },
                    },
                };
            }
        }

        if let Some(token) = refreshed {
            // Retried attempt: the refreshed credential replaces whatever
            // Authorization the first attempt carried.
            match bearer_value(token) {
                Some(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                None => tracing::warn!("refreshed credential is not a valid header value"),
            }
        } else if !headers.contains_key(AUTHORIZATION) {
            if let Some(get_token) = &self.config.get_token {
                if let Some(token) = get_token().filter(|token| !token.is_empty()) {
                    match bearer_value(&token) {
                        Some(value) => {
                            headers.insert(AUTHORIZATION, value);
                        }
                        None => tracing::warn!("credential is not a valid header value"),
                    }
                }
            }
        }

        let token = CancellationToken::new();
        if let Some(external) = &options.cancel {
            if external.is_cancelled() {
                return AttemptOutcome::Cancelled;
            }
        }
        let _registration = options
            .scope
            .as_ref()
            .map(|scope| scope.register(token.clone()));

        let request = builder.headers(headers);
        let work = async {
            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    return if token.is_cancelled() {
                        AttemptOutcome::Cancelled
                    } else {
                        AttemptOutcome::Network {
                            message: err.to_string(),
                        }
                    }
                }
            };
            let status = response.status();
            match decode_response(response).await {
                Ok(decoded) => {
                    if status.is_success() {
                        AttemptOutcome::Success(decoded)
                    } else {
                        let data = (!decoded.is_empty()).then_some(decoded);
                        AttemptOutcome::HttpError {
                            status: status.as_u16(),
                            data,
                        }
                    }
                }
                Err(message) => AttemptOutcome::Network { message },
            }
        };
        let aborted = async {
            match &options.cancel {
                Some(external) => tokio::select! {
                    _ = token.cancelled() => {},
                    _ = external.cancelled() => {},
                },
                None => token.cancelled().await,
            }
        };

        // The sleep is the attempt's only timer; whichever branch wins, the
        // others are dropped, so it can neither leak nor fire twice.
        let outcome = tokio::select! {
            outcome = work => outcome,
            _ = aborted => {
                token.cancel();
                AttemptOutcome::Cancelled
            }
            _ = tokio::time::sleep(self.config.timeout) => {
                token.cancel();
                AttemptOutcome::Cancelled
            }
        };

        // A response racing a cancellation may land first; the cancelled
        // state still wins before the result counts as success.
        if token.is_cancelled() {
            AttemptOutcome::Cancelled
        } else {
            outcome
        }
    }
}

fn is_read_verb(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE
}

fn bearer_value(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}")).ok()
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::{bearer_value, is_read_verb, ApiClient, Payload};
    use crate::{Body, ClientConfig, Query};

    #[test]
    fn read_verbs_are_get_and_delete() {
        assert!(is_read_verb(&Method::GET));
        assert!(is_read_verb(&Method::DELETE));
        assert!(!is_read_verb(&Method::POST));
        assert!(!is_read_verb(&Method::PUT));
        assert!(!is_read_verb(&Method::PATCH));
    }

    #[test]
    fn bearer_value_carries_scheme() {
        let value = bearer_value("abc123").expect("plain token must be valid");
        assert_eq!(value.to_str().expect("ascii"), "Bearer abc123");
        assert!(bearer_value("line\nbreak").is_none());
    }

    #[test]
    fn compose_url_appends_query_for_read_verbs_only() {
        let client = ApiClient::new(ClientConfig::new().base_url("http://api.test"));
        let query = Payload::Query(Query::new().with("a", 1));
        assert_eq!(
            client.compose_url(&Method::GET, "/items", &query),
            "http://api.test/items?a=1"
        );
        assert_eq!(
            client.compose_url(&Method::POST, "/items", &query),
            "http://api.test/items"
        );
    }

    #[test]
    fn payload_conversions() {
        assert!(matches!(
            Payload::from(Query::new().with("a", 1)),
            Payload::Query(_)
        ));
        assert!(matches!(
            Payload::from(Body::from(json!({"a": 1}))),
            Payload::Body(_)
        ));
    }

    #[test]
    fn debug_does_not_leak_configuration_closures() {
        let client = ApiClient::new(ClientConfig::new().get_token(|| Some("secret".to_owned())));
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
    }
}
