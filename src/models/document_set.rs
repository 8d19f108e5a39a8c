use serde::{Deserialize, Serialize};

use super::{AnswerResult, Document, ExtractionFailure};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Member {
    key: String,
    document: Document,
}

/// Named collection of documents forming one unit of question answering work.
///
/// Holds the question under one key and retrieved passages under others.
/// Member keys are unique and members iterate in insertion order. At most
/// one member is marked as the query.
///
/// # Examples
///
/// ```
/// use qapipe::{Document, DocumentSet};
///
/// let mut set = DocumentSet::boxed("query", Document::new("Who wrote Hamlet?"));
/// set.insert("passage_0", Document::new("Hamlet is a tragedy by Shakespeare.")).unwrap();
///
/// assert_eq!(set.query_key(), Some("query"));
/// assert_eq!(set.keys().collect::<Vec<_>>(), vec!["query", "passage_0"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocumentSet")]
pub struct DocumentSet {
    name: String,
    members: Vec<Member>,
    query_key: Option<String>,
    #[serde(default)]
    answers: Vec<AnswerResult>,
    #[serde(default)]
    failures: Vec<ExtractionFailure>,
}

#[derive(Deserialize)]
struct RawDocumentSet {
    name: String,
    members: Vec<Member>,
    query_key: Option<String>,
    #[serde(default)]
    answers: Vec<AnswerResult>,
    #[serde(default)]
    failures: Vec<ExtractionFailure>,
}

impl TryFrom<RawDocumentSet> for DocumentSet {
    type Error = ConfigurationError;

    fn try_from(raw: RawDocumentSet) -> Result<Self, Self::Error> {
        let mut set = DocumentSet::new(raw.name);
        for member in raw.members {
            set.insert(member.key, member.document)?;
        }
        if let Some(key) = raw.query_key {
            set.mark_query(&key)?;
        }
        set.answers = raw.answers;
        set.failures = raw.failures;
        Ok(set)
    }
}

impl DocumentSet {
    /// Creates an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            query_key: None,
            answers: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Wraps a single document as the query member of a new set named `key`.
    pub fn boxed(key: impl Into<String>, document: Document) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            members: vec![Member {
                key: key.clone(),
                document,
            }],
            query_key: Some(key),
            answers: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a member under a key that is not yet taken.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        document: Document,
    ) -> Result<(), ConfigurationError> {
        let key = key.into();
        if self.contains(&key) {
            return Err(ConfigurationError::DuplicateMember(key));
        }
        self.members.push(Member { key, document });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|m| m.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.members
            .iter()
            .find(|m| m.key == key)
            .map(|m| &m.document)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.members
            .iter_mut()
            .find(|m| m.key == key)
            .map(|m| &mut m.document)
    }

    /// Looks up a member, failing with the set name and key when absent.
    pub fn require(&self, key: &str) -> Result<&Document, ConfigurationError> {
        self.get(key).ok_or_else(|| self.missing(key))
    }

    /// Mutable counterpart of [`DocumentSet::require`].
    pub fn require_mut(&mut self, key: &str) -> Result<&mut Document, ConfigurationError> {
        let name = &self.name;
        self.members
            .iter_mut()
            .find(|m| m.key == key)
            .map(|m| &mut m.document)
            .ok_or_else(|| ConfigurationError::MissingMember {
                set: name.clone(),
                key: key.to_string(),
            })
    }

    /// Member keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.key.as_str())
    }

    /// Members as `(key, document)` pairs in insertion order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.members.iter().map(|m| (m.key.as_str(), &m.document))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn query_key(&self) -> Option<&str> {
        self.query_key.as_deref()
    }

    /// Marks an existing member as the query, replacing any previous mark.
    pub fn mark_query(&mut self, key: &str) -> Result<(), ConfigurationError> {
        if !self.contains(key) {
            return Err(self.missing(key));
        }
        self.query_key = Some(key.to_string());
        Ok(())
    }

    pub fn is_query(&self, key: &str) -> bool {
        self.query_key.as_deref() == Some(key)
    }

    pub fn answers(&self) -> &[AnswerResult] {
        &self.answers
    }

    pub fn failures(&self) -> &[ExtractionFailure] {
        &self.failures
    }

    pub fn record_answer(&mut self, answer: AnswerResult) {
        self.answers.push(answer);
    }

    pub fn record_failure(&mut self, failure: ExtractionFailure) {
        self.failures.push(failure);
    }

    fn missing(&self, key: &str) -> ConfigurationError {
        ConfigurationError::MissingMember {
            set: self.name.clone(),
            key: key.to_string(),
        }
    }
}
