use bytes::Bytes;

/// Request-body payload for write verbs (POST, PUT, PATCH).
///
/// `Json` is serialized into the body with `Content-Type: application/json`
/// set only when the caller did not supply one. `Bytes` and `Form` are
/// binary-like: they pass to the transport unmodified with no Content-Type
/// override.
#[derive(Clone, Debug, Default)]
pub enum Body {
    /// No request body.
    #[default]
    Empty,
    /// JSON document serialized into the body.
    Json(serde_json::Value),
    /// Raw byte buffer sent as-is.
    Bytes(Bytes),
    /// Multipart form sent as-is (reqwest supplies the boundary header).
    Form(FormBody),
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<FormBody> for Body {
    fn from(value: FormBody) -> Self {
        Self::Form(value)
    }
}

/// Clonable multipart form description.
///
/// `reqwest::multipart::Form` cannot be cloned, so the parts are kept here
/// and a fresh `Form` is built for each attempt; the refresh retry resends
/// the identical payload.
#[derive(Clone, Debug, Default)]
pub struct FormBody {
    parts: Vec<FormPart>,
}

#[derive(Clone, Debug)]
struct FormPart {
    name: String,
    value: FormValue,
}

#[derive(Clone, Debug)]
enum FormValue {
    Text(String),
    Bytes {
        data: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    /// Adds a raw bytes field.
    pub fn bytes(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Bytes {
                data: data.into(),
                file_name: None,
                mime: None,
            },
        });
        self
    }

    /// Adds a file field with a file name and MIME type.
    pub fn file(
        mut self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Bytes {
                data: data.into(),
                file_name: Some(file_name.into()),
                mime: Some(mime.into()),
            },
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Builds the wire form for one attempt.
    pub(crate) fn to_multipart(&self) -> Result<reqwest::multipart::Form, String> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            let piece = match &part.value {
                FormValue::Text(value) => reqwest::multipart::Part::text(value.clone()),
                FormValue::Bytes {
                    data,
                    file_name,
                    mime,
                } => {
                    let mut piece = reqwest::multipart::Part::bytes(data.to_vec());
                    if let Some(file_name) = file_name {
                        piece = piece.file_name(file_name.clone());
                    }
                    if let Some(mime) = mime {
                        piece = piece
                            .mime_str(mime)
                            .map_err(|err| format!("invalid mime type '{mime}': {err}"))?;
                    }
                    piece
                }
            };
            form = form.part(part.name.clone(), piece);
        }
        Ok(form)
    }
}
