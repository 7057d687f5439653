use bytes::Bytes;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;

/// Decoded response payload.
///
/// The variant is chosen from the response's declared content type, so
/// file-download style responses come back as [`ResponseBody::Bytes`] without
/// the caller pre-declaring an expected shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// Absent body (204 No Content).
    Empty,
    /// JSON media type, parsed.
    Json(serde_json::Value),
    /// Text or XML media type, raw text.
    Text(String),
    /// Any other (or missing) media type, opaque bytes.
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserializes the decoded JSON value into a typed shape.
    ///
    /// `Empty` deserializes from JSON null, so `Option<T>` targets map a 204
    /// to `None`.
    pub fn json_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        let value = match self {
            Self::Json(value) => value.clone(),
            Self::Empty | Self::Bytes(_) => serde_json::Value::Null,
            Self::Text(text) => serde_json::Value::String(text.clone()),
        };
        serde_json::from_value(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeKind {
    Json,
    Text,
    Binary,
}

/// Picks the decode strategy from a declared content type: primary media
/// type only, semicolon parameters stripped, case-insensitive.
fn negotiate(content_type: Option<&str>) -> DecodeKind {
    let Some(content_type) = content_type else {
        return DecodeKind::Binary;
    };
    let primary = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if primary == "application/json" || primary.ends_with("+json") {
        DecodeKind::Json
    } else if primary.starts_with("text/") || primary == "application/xml" {
        DecodeKind::Text
    } else {
        DecodeKind::Binary
    }
}

/// Decodes a response body by its declared content type.
///
/// A 204 resolves to [`ResponseBody::Empty`] without touching the body,
/// whatever the headers say. Read and parse failures come back as plain
/// messages; the executor maps them to a transport-class error.
pub(crate) async fn decode_response(response: reqwest::Response) -> Result<ResponseBody, String> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(ResponseBody::Empty);
    }
    let kind = negotiate(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );
    match kind {
        DecodeKind::Json => {
            let text = response
                .text()
                .await
                .map_err(|err| format!("failed to read response body: {err}"))?;
            serde_json::from_str(&text)
                .map(ResponseBody::Json)
                .map_err(|err| format!("invalid json response body: {err}"))
        }
        DecodeKind::Text => response
            .text()
            .await
            .map(ResponseBody::Text)
            .map_err(|err| format!("failed to read response body: {err}")),
        DecodeKind::Binary => response
            .bytes()
            .await
            .map(ResponseBody::Bytes)
            .map_err(|err| format!("failed to read response body: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{negotiate, DecodeKind, ResponseBody};

    #[test]
    fn json_media_types() {
        assert_eq!(negotiate(Some("application/json")), DecodeKind::Json);
        assert_eq!(
            negotiate(Some("Application/JSON; charset=utf-8")),
            DecodeKind::Json
        );
        assert_eq!(negotiate(Some("application/problem+json")), DecodeKind::Json);
    }

    #[test]
    fn text_and_xml_media_types() {
        assert_eq!(negotiate(Some("text/plain")), DecodeKind::Text);
        assert_eq!(negotiate(Some("text/html; charset=utf-8")), DecodeKind::Text);
        assert_eq!(negotiate(Some("application/xml")), DecodeKind::Text);
    }

    #[test]
    fn everything_else_is_binary() {
        assert_eq!(negotiate(Some("image/png")), DecodeKind::Binary);
        assert_eq!(negotiate(Some("application/octet-stream")), DecodeKind::Binary);
        assert_eq!(negotiate(None), DecodeKind::Binary);
    }

    #[test]
    fn json_as_deserializes_typed_shapes() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Item {
            name: String,
        }
        let body = ResponseBody::Json(json!({"name": "x"}));
        assert_eq!(
            body.json_as::<Item>().expect("must deserialize"),
            Item {
                name: "x".to_owned()
            }
        );
    }

    #[test]
    fn empty_body_maps_to_none() {
        let body = ResponseBody::Empty;
        let value: Option<String> = body.json_as().expect("null must deserialize");
        assert!(value.is_none());
    }
}
