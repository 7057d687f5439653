//! `apiwire` is an async HTTP API client for bearer-token backends.
//!
//! The crate wraps one request/response cycle with ergonomic verb methods:
//! - [`ApiClient::get`] / [`ApiClient::delete`] — query-parameter payloads
//! - [`ApiClient::post`] / [`ApiClient::put`] / [`ApiClient::patch`] — body payloads
//!
//! Every request gets bearer-token injection from the configured accessor, a
//! per-request timeout, cooperative cancellation, and a single refresh-and-
//! retry pass when the backend answers 401. Responses decode by declared
//! content type into [`ResponseBody`]; failures resolve to exactly one
//! [`ApiError`] per logical request.

mod body;
mod cancel;
mod client;
mod config;
mod decode;
mod error;
mod query;
mod url;

pub use body::{Body, FormBody};
pub use cancel::RequestScope;
pub use client::{ApiClient, Payload, RequestOptions};
pub use config::{BoxError, ClientConfig};
pub use decode::ResponseBody;
pub use error::ApiError;
pub use query::{Query, QueryValue};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ApiError>;
