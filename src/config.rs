//! Stage configuration.
//!
//! Each stage has its own configuration struct with documented defaults.
//! `Settings::from_env` gathers them all, applying environment overrides.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::Query;

const DEFAULT_QUERY_KEY: &str = "query";

fn require_key(value: &str, key: &'static str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        Err(ConfigurationError::EmptyKey { key })
    } else {
        Ok(())
    }
}

/// Configuration for [`crate::stages::Boxer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxerConfig {
    /// Key (and set name) the boxed document is stored under.
    pub box_key: String,
}

impl Default for BoxerConfig {
    fn default() -> Self {
        Self {
            box_key: DEFAULT_QUERY_KEY.to_string(),
        }
    }
}

impl BoxerConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_key(&self.box_key, "box_key")
    }
}

/// Configuration for [`crate::stages::QueryBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryBuilderConfig {
    /// Member holding the question.
    pub query_key: String,
    /// Indexed field the phrase is matched against.
    pub field: String,
    /// Maximum number of passages to return.
    pub size: u32,
    /// Allowed word distance for the phrase match.
    pub slop: u32,
}

impl Default for QueryBuilderConfig {
    fn default() -> Self {
        Self {
            query_key: DEFAULT_QUERY_KEY.to_string(),
            field: "content".to_string(),
            size: 1000,
            slop: Query::DEFAULT_SLOP,
        }
    }
}

impl QueryBuilderConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_key(&self.query_key, "query_key")?;
        require_key(&self.field, "field")?;
        if self.size == 0 {
            return Err(ConfigurationError::ZeroSize);
        }
        Ok(())
    }
}

/// Configuration for [`crate::stages::RetrievalStage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Member carrying the query to send.
    pub query_key: String,
    /// Retrieved passages are stored as `{result_prefix}_{index}`.
    pub result_prefix: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_key: DEFAULT_QUERY_KEY.to_string(),
            result_prefix: "passage".to_string(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_key(&self.query_key, "query_key")?;
        require_key(&self.result_prefix, "result_prefix")
    }
}

/// Configuration for [`crate::stages::AnswerStage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Member holding the question; every other member is a context.
    pub query_key: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            query_key: DEFAULT_QUERY_KEY.to_string(),
        }
    }
}

impl AnswerConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_key(&self.query_key, "query_key")
    }
}

/// All stage configuration for one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub boxer: BoxerConfig,
    pub query_builder: QueryBuilderConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
}

impl Settings {
    /// Defaults overridden by `QUERY_FIELD`, `QUERY_SIZE` and `RESULT_PREFIX`.
    ///
    /// Unparseable `QUERY_SIZE` values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(field) = std::env::var("QUERY_FIELD") {
            settings.query_builder.field = field;
        }
        if let Ok(size) = std::env::var("QUERY_SIZE") {
            match size.parse() {
                Ok(size) => settings.query_builder.size = size,
                Err(e) => tracing::warn!(value = %size, error = %e, "ignoring invalid QUERY_SIZE"),
            }
        }
        if let Ok(prefix) = std::env::var("RESULT_PREFIX") {
            settings.retrieval.result_prefix = prefix;
        }

        settings
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.boxer.validate()?;
        self.query_builder.validate()?;
        self.retrieval.validate()?;
        self.answer.validate()
    }
}
