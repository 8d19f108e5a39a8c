use std::sync::Arc;

use crate::capability::{CapabilityKind, SearchCapability};
use crate::config::RetrievalConfig;
use crate::error::{ConfigurationError, RetrievalError, StageError};
use crate::models::{Document, DocumentSet};
use crate::pipeline::{Stage, Unit};

/// Sends the query member's search query and adds the hits to the set.
pub struct RetrievalStage {
    name: String,
    config: RetrievalConfig,
    search: Arc<dyn SearchCapability>,
}

impl RetrievalStage {
    pub fn new(config: RetrievalConfig, search: Arc<dyn SearchCapability>) -> Self {
        Self {
            name: "retrieval".to_string(),
            config,
            search,
        }
    }

    /// Renames the stage so one pipeline can search several indexes.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns `set` extended with one member per hit, keyed
    /// `{result_prefix}_{rank}` in the order the search returned them.
    pub fn apply(&self, mut set: DocumentSet) -> Result<DocumentSet, RetrievalError> {
        let key = self.config.query_key.as_str();
        let member = set.get(key).ok_or_else(|| RetrievalError::MissingQueryMember {
            set: set.name().to_string(),
            key: key.to_string(),
        })?;
        let query = member
            .query()
            .ok_or_else(|| RetrievalError::MissingQuery {
                key: key.to_string(),
            })?
            .clone();

        let hits = self.search.find(&query).map_err(RetrievalError::Search)?;
        tracing::info!(
            query = query.match_text(),
            hits = hits.len(),
            "retrieved passages"
        );

        for (rank, hit) in hits.into_iter().enumerate() {
            let passage_key = format!("{}_{}", self.config.result_prefix, rank);
            tracing::debug!(key = %passage_key, score = hit.score, "adding passage");
            set.insert(passage_key, Document::new(hit.text))
                .map_err(|error| match error {
                    ConfigurationError::DuplicateMember(key) => RetrievalError::DuplicateMember(key),
                    other => RetrievalError::Member(other),
                })?;
        }

        Ok(set)
    }
}

impl Stage for RetrievalStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Option<CapabilityKind> {
        Some(CapabilityKind::Search)
    }

    fn initialize(&self) -> Result<(), StageError> {
        self.config.validate()?;
        self.search
            .init()
            .map_err(|source| StageError::Initialization {
                capability: CapabilityKind::Search,
                source,
            })
    }

    fn close(&self) {
        self.search.close();
    }

    fn process(&self, unit: Unit) -> Result<Unit, StageError> {
        let set = unit.into_set(self.name())?;
        Ok(self.apply(set)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::capability::SearchHit;
    use crate::models::Query;
    use std::sync::Mutex;

    /// Returns canned hits and remembers the queries it saw.
    struct CannedSearch {
        hits: Vec<SearchHit>,
        seen: Mutex<Vec<String>>,
    }

    impl CannedSearch {
        fn new(hits: Vec<SearchHit>) -> Self {
            Self {
                hits,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl SearchCapability for CannedSearch {
        fn find(&self, query: &Query) -> Result<Vec<SearchHit>, BackendError> {
            self.seen.lock().unwrap().push(query.match_text().to_string());
            Ok(self.hits.clone())
        }
    }

    struct Offline;

    impl SearchCapability for Offline {
        fn find(&self, _query: &Query) -> Result<Vec<SearchHit>, BackendError> {
            Err(BackendError::Http { status: 503 })
        }
    }

    fn question_set() -> DocumentSet {
        let mut doc = Document::new("What do cats chase?");
        doc.attach_query(Query::new("cats chase", "content", 10, 1000).unwrap());
        DocumentSet::boxed("query", doc)
    }

    #[test]
    fn adds_hits_in_search_order() {
        let search = Arc::new(CannedSearch::new(vec![
            SearchHit::new("cats chase mice", 0.9),
            SearchHit::new("dogs chase cats", 0.5),
        ]));
        let stage = RetrievalStage::new(RetrievalConfig::default(), search.clone());

        let set = stage.apply(question_set()).unwrap();

        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["query", "passage_0", "passage_1"]
        );
        assert_eq!(set.get("passage_0").unwrap().text(), "cats chase mice");
        assert_eq!(set.get("passage_1").unwrap().text(), "dogs chase cats");
        assert_eq!(*search.seen.lock().unwrap(), vec!["cats chase"]);
    }

    #[test]
    fn no_hits_leaves_set_unchanged() {
        let stage = RetrievalStage::new(
            RetrievalConfig::default(),
            Arc::new(CannedSearch::new(Vec::new())),
        );

        let set = stage.apply(question_set()).unwrap();
        assert_eq!(set, question_set());
    }

    #[test]
    fn uses_configured_prefix() {
        let config = RetrievalConfig {
            result_prefix: "hit".to_string(),
            ..RetrievalConfig::default()
        };
        let stage = RetrievalStage::new(
            config,
            Arc::new(CannedSearch::new(vec![SearchHit::new("a passage", 1.0)])),
        );

        let set = stage.apply(question_set()).unwrap();
        assert!(set.contains("hit_0"));
    }

    #[test]
    fn missing_query_member_is_reported() {
        let stage = RetrievalStage::new(
            RetrievalConfig::default(),
            Arc::new(CannedSearch::new(Vec::new())),
        );

        let result = stage.apply(DocumentSet::new("empty"));
        assert!(matches!(result, Err(RetrievalError::MissingQueryMember { .. })));
    }

    #[test]
    fn member_without_query_is_reported() {
        let stage = RetrievalStage::new(
            RetrievalConfig::default(),
            Arc::new(CannedSearch::new(Vec::new())),
        );

        let set = DocumentSet::boxed("query", Document::new("no query yet"));
        assert!(matches!(
            stage.apply(set),
            Err(RetrievalError::MissingQuery { .. })
        ));
    }

    #[test]
    fn passage_key_clash_is_reported() {
        let stage = RetrievalStage::new(
            RetrievalConfig::default(),
            Arc::new(CannedSearch::new(vec![SearchHit::new("cats chase mice", 0.9)])),
        );
        let mut set = question_set();
        set.insert("passage_0", Document::new("kept from earlier")).unwrap();

        let result = stage.apply(set);
        assert!(matches!(
            result,
            Err(RetrievalError::DuplicateMember(key)) if key == "passage_0"
        ));
    }

    #[test]
    fn renamed_stage_processes_under_new_name() {
        let stage = RetrievalStage::new(
            RetrievalConfig::default(),
            Arc::new(CannedSearch::new(Vec::new())),
        )
        .with_name("wiki_retrieval");

        assert_eq!(stage.name(), "wiki_retrieval");
        let error = stage.process(Document::new("bare").into()).unwrap_err();
        assert!(error.to_string().contains("wiki_retrieval"));
    }

    #[test]
    fn search_failure_is_not_fatal() {
        let stage = RetrievalStage::new(RetrievalConfig::default(), Arc::new(Offline));

        let error = stage.process(question_set().into()).unwrap_err();
        assert!(matches!(error, StageError::Retrieval(RetrievalError::Search(_))));
        assert!(!error.is_fatal());
    }
}
