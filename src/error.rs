use crate::ResponseBody;

/// Error type returned by this crate.
///
/// Every terminal outcome of a logical request maps to exactly one of these
/// variants. Numeric status follows the original wire contract: `0` for
/// transport failures, `499` for cancelled/timed-out requests, the literal
/// HTTP status otherwise.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or request execution error; no HTTP response was received.
    #[error("network error for {url}: {message}")]
    Network {
        /// Absolute URL of the failing request.
        url: String,
        /// Message from the underlying transport failure.
        message: String,
    },
    /// The attempt was cancelled by timeout or an external cancellation token.
    #[error("request aborted for {url}")]
    Cancelled {
        /// Absolute URL of the failing request.
        url: String,
    },
    /// Non-success HTTP status with the decoded error body, if any.
    #[error("request failed with status {status} for {url}")]
    Http {
        /// Literal HTTP status code.
        status: u16,
        /// Absolute URL of the failing request.
        url: String,
        /// Decoded error response body, when the server sent one.
        data: Option<ResponseBody>,
    },
}

impl ApiError {
    /// Numeric status of the failure: `0` transport, `499` cancelled,
    /// otherwise the HTTP status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Network { .. } => 0,
            Self::Cancelled { .. } => 499,
            Self::Http { status, .. } => *status,
        }
    }

    /// Absolute URL the failing request was issued against.
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. } | Self::Cancelled { url } | Self::Http { url, .. } => url,
        }
    }

    /// Decoded error response body, present only for [`ApiError::Http`].
    pub fn data(&self) -> Option<&ResponseBody> {
        match self {
            Self::Http { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn status_mapping() {
        let network = ApiError::Network {
            url: "http://a/x".to_owned(),
            message: "connection refused".to_owned(),
        };
        let cancelled = ApiError::Cancelled {
            url: "http://a/x".to_owned(),
        };
        let http = ApiError::Http {
            status: 404,
            url: "http://a/x".to_owned(),
            data: None,
        };
        assert_eq!(network.status(), 0);
        assert_eq!(cancelled.status(), 499);
        assert_eq!(http.status(), 404);
    }

    #[test]
    fn display_carries_status_and_url() {
        let err = ApiError::Http {
            status: 503,
            url: "http://a/items".to_owned(),
            data: None,
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("http://a/items"));
    }
}
