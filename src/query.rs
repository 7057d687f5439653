use chrono::{DateTime, SecondsFormat, Utc};

/// A single query-parameter value.
///
/// Mirrors what callers actually put in query mappings: scalars, timestamps,
/// nested JSON documents, and arrays that expand into repeated keys.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    /// Absent value; the key is dropped from the serialized query entirely.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Serialized as an ISO-8601 timestamp with millisecond precision.
    Timestamp(DateTime<Utc>),
    /// Arbitrary JSON; objects and arrays serialize as their JSON text,
    /// scalars as their bare string form.
    Json(serde_json::Value),
    /// Expands into one repeated key per element, in element order.
    List(Vec<QueryValue>),
}

impl QueryValue {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => (*value).into(),
            Self::Int(value) => (*value).into(),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(value) => value.clone().into(),
            Self::Timestamp(value) => value
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
            Self::Json(value) => value.clone(),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }

    /// Renders one serialized parameter value. `Null` only reaches here when
    /// nested inside a list, where it keeps its JSON spelling.
    fn render(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Timestamp(value) => value.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::Json(serde_json::Value::String(value)) => value.clone(),
            Self::Json(value) => value.to_string(),
            Self::List(_) => self.to_json().to_string(),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Query-parameter payload for read verbs (GET, DELETE).
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Ordered key/value mapping serialized with the [`QueryValue`] rules.
    Map(Vec<(String, QueryValue)>),
    /// Pre-built parameter pairs appended verbatim (still percent-encoded).
    Pairs(Vec<(String, String)>),
}

impl Query {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::Map(Vec::new())
    }

    /// Builds pre-serialized parameter pairs.
    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Appends one entry.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        match self {
            Self::Map(entries) => entries.push((key.into(), value.into())),
            Self::Pairs(pairs) => pairs.push((key.into(), value.into().render())),
        }
    }

    /// Builder form of [`Query::push`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(entries) => entries.is_empty(),
            Self::Pairs(pairs) => pairs.is_empty(),
        }
    }

    /// Serializes into a percent-encoded query string.
    ///
    /// Absent (`Null`) mapping values are skipped; falsy-but-present values
    /// (empty string, zero, `false`) are kept. Lists repeat the key once per
    /// element in order.
    pub fn serialize(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        match self {
            Self::Pairs(pairs) => {
                for (key, value) in pairs {
                    serializer.append_pair(key, value);
                }
            }
            Self::Map(entries) => {
                for (key, value) in entries {
                    match value {
                        QueryValue::Null => {}
                        QueryValue::List(items) => {
                            for item in items {
                                serializer.append_pair(key, &item.render());
                            }
                        }
                        other => {
                            serializer.append_pair(key, &other.render());
                        }
                    }
                }
            }
        }
        serializer.finish()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl From<()> for Query {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl From<Vec<(String, String)>> for Query {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Pairs(pairs)
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{Query, QueryValue};

    fn parse(query: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn list_expands_into_repeated_keys_in_order() {
        let query = Query::new().with("tags", vec!["a", "b"]);
        assert_eq!(query.serialize(), "tags=a&tags=b");
    }

    #[test]
    fn null_keys_are_dropped_falsy_values_kept() {
        let query = Query::new()
            .with("gone", QueryValue::Null)
            .with("empty", "")
            .with("zero", 0)
            .with("no", false);
        let pairs = parse(&query.serialize());
        assert_eq!(
            pairs,
            vec![
                ("empty".to_owned(), String::new()),
                ("zero".to_owned(), "0".to_owned()),
                ("no".to_owned(), "false".to_owned()),
            ]
        );
    }

    #[test]
    fn timestamp_serializes_as_iso8601_millis() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let query = Query::new().with("since", at);
        assert_eq!(
            parse(&query.serialize()),
            vec![("since".to_owned(), "2024-05-01T12:30:00.000Z".to_owned())]
        );
    }

    #[test]
    fn json_object_serializes_as_json_text() {
        let query = Query::new().with("filter", json!({"name": "x"}));
        assert_eq!(
            parse(&query.serialize()),
            vec![("filter".to_owned(), r#"{"name":"x"}"#.to_owned())]
        );
    }

    #[test]
    fn json_scalar_serializes_bare() {
        let query = Query::new()
            .with("s", json!("plain"))
            .with("n", json!(3));
        assert_eq!(
            parse(&query.serialize()),
            vec![
                ("s".to_owned(), "plain".to_owned()),
                ("n".to_owned(), "3".to_owned()),
            ]
        );
    }

    #[test]
    fn serialize_then_parse_round_trips_values_needing_encoding() {
        let query = Query::new().with("q", "a b&c=d").with("page", 2);
        let pairs = parse(&query.serialize());
        assert_eq!(
            pairs,
            vec![
                ("q".to_owned(), "a b&c=d".to_owned()),
                ("page".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[test]
    fn prebuilt_pairs_pass_through() {
        let query = Query::pairs([("a", "1"), ("a", "2")]);
        assert_eq!(query.serialize(), "a=1&a=2");
    }

    #[test]
    fn option_none_maps_to_null() {
        let query = Query::new().with("key", None::<&str>);
        assert_eq!(query.serialize(), "");
        assert!(!query.is_empty());
    }
}
