use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ConfigurationError;

/// Structured phrase-search request built from a question.
///
/// Immutable once constructed; fields are exposed through accessors only.
///
/// # Examples
///
/// ```
/// use qapipe::Query;
///
/// let query = Query::new("the cat chased", "content", 10, 1000).unwrap();
/// let body = query.to_search_body();
///
/// assert_eq!(body["query"]["match_phrase"]["content"]["query"], "the cat chased");
/// assert_eq!(body["size"], 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuery")]
pub struct Query {
    match_text: String,
    field: String,
    slop: u32,
    size: u32,
}

#[derive(Deserialize)]
struct RawQuery {
    match_text: String,
    field: String,
    slop: u32,
    size: u32,
}

impl TryFrom<RawQuery> for Query {
    type Error = ConfigurationError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        Query::new(raw.match_text, raw.field, raw.slop, raw.size)
    }
}

impl Query {
    /// Slop used for every phrase query built from a question.
    pub const DEFAULT_SLOP: u32 = 10;

    /// Creates a query, rejecting an empty field or a zero result size.
    pub fn new(
        match_text: impl Into<String>,
        field: impl Into<String>,
        slop: u32,
        size: u32,
    ) -> Result<Self, ConfigurationError> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(ConfigurationError::EmptyKey { key: "field" });
        }
        if size == 0 {
            return Err(ConfigurationError::ZeroSize);
        }

        Ok(Self {
            match_text: match_text.into(),
            field,
            slop,
            size,
        })
    }

    pub fn match_text(&self) -> &str {
        &self.match_text
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn slop(&self) -> u32 {
        self.slop
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Encodes the query as an Elasticsearch `match_phrase` search body.
    pub fn to_search_body(&self) -> Value {
        let mut phrase = Map::new();
        phrase.insert(
            self.field.clone(),
            json!({
                "query": self.match_text,
                "slop": self.slop,
            }),
        );

        json!({
            "query": { "match_phrase": Value::Object(phrase) },
            "size": self.size,
        })
    }
}
