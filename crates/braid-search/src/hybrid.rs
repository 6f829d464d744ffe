//! Hybrid query orchestration across the vector index and the knowledge graph.
//!
//! A request runs once through `RETRIEVE -> FUSE -> ENRICH`. During retrieve
//! the vector lookup and the graph leg (entity extraction, then the graph
//! lookup) each run on a scoped thread; both are joined before fusion.
//!
//! The orchestrator degrades gracefully:
//! - a source that is not configured contributes no candidates
//! - a source call that fails or panics is logged and contributes no candidates
//! - a failed content store lookup leaves results without summaries
//!
//! Only the absence of both sources is an error, raised once by
//! [`HybridSearch::new`].

use std::thread::ScopedJoinHandle;

use anyhow::Context;
use braid_core::{BraidError, Candidate, ContentStore, EnrichedResult, ResultRow};
use braid_core::config::SearchConfig;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::enrich::enrich;
use crate::fusion::{FusionOutput, FusionPolicy, MergeMethod, fuse};
use crate::source::{EntityExtractor, GraphSource, VectorSource};
use crate::timing::{STAGE_ENRICH, STAGE_FUSE, STAGE_RETRIEVE, StageTimings};

/// Result count used when a request does not name one.
pub const DEFAULT_LIMIT: usize = 10;

/// Vector weight used when a request does not name one.
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.5;

/// The graph leg of a search: an extractor feeding a graph source.
pub struct GraphRetrieval {
    pub source: Box<dyn GraphSource>,
    pub extractor: Box<dyn EntityExtractor>,
}

impl GraphRetrieval {
    pub fn new(source: impl GraphSource + 'static, extractor: impl EntityExtractor + 'static) -> Self {
        Self {
            source: Box::new(source),
            extractor: Box::new(extractor),
        }
    }

    /// Extract entities and query the graph. Failures degrade to no hits.
    fn retrieve(&self, query: &str, limit: usize) -> Vec<Candidate> {
        let entities = match self.extractor.extract(query) {
            Ok(entities) => entities,
            Err(err) => {
                warn!("entity extraction failed, skipping knowledge graph search: {err:#}");
                return Vec::new();
            }
        };
        if entities.is_empty() {
            info!("no entities in query, skipping knowledge graph search");
            return Vec::new();
        }

        match self.source.search(&entities, limit) {
            Ok(hits) => {
                info!(source = self.source.name(), results = hits.len(), "knowledge graph search");
                hits
            }
            Err(err) => {
                warn!(
                    source = self.source.name(),
                    "knowledge graph search failed, continuing without it: {err:#}"
                );
                Vec::new()
            }
        }
    }
}

/// Which sources a [`HybridSearch`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub vector_search_available: bool,
    pub knowledge_graph_available: bool,
}

/// Parameters for one hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub vector_weight: f64,
    pub merge_method: MergeMethod,
    /// Skip entity extraction and the graph source entirely.
    pub vector_only: bool,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_LIMIT,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            merge_method: MergeMethod::Weighted,
            vector_only: false,
        }
    }

    /// Build a request from the `[search]` config table.
    ///
    /// An unknown merge method falls back to interleave unless
    /// `strict_merge_method` is set.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::InvalidPolicy`] for an unknown merge method when
    /// strict parsing is enabled.
    pub fn from_config(query: impl Into<String>, config: &SearchConfig) -> Result<Self, BraidError> {
        let merge_method = if config.strict_merge_method {
            config.merge_method.parse()?
        } else {
            MergeMethod::parse_lenient(&config.merge_method)
        };

        Ok(Self {
            limit: config.limit,
            vector_weight: config.vector_weight,
            merge_method,
            ..Self::new(query)
        })
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_vector_weight(mut self, vector_weight: f64) -> Self {
        self.vector_weight = vector_weight;
        self
    }

    #[must_use]
    pub const fn with_merge_method(mut self, merge_method: MergeMethod) -> Self {
        self.merge_method = merge_method;
        self
    }

    #[must_use]
    pub const fn with_vector_only(mut self, vector_only: bool) -> Self {
        self.vector_only = vector_only;
        self
    }

    #[must_use]
    pub fn policy(&self) -> FusionPolicy {
        self.merge_method.into_policy(self.vector_weight)
    }
}

/// What a search returns: one ranked list, or two lists for the separate policy.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResults {
    Ranked(Vec<EnrichedResult>),
    /// Each source's own hits. These are not enriched.
    Separate {
        vector: Vec<EnrichedResult>,
        graph: Vec<EnrichedResult>,
    },
}

impl SearchResults {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ranked(results) => results.len(),
            Self::Separate { vector, graph } => vector.len() + graph.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into rows: separate lists are concatenated vector first and
    /// cut at `limit`.
    #[must_use]
    pub fn to_rows(&self, limit: usize) -> Vec<ResultRow> {
        match self {
            Self::Ranked(results) => results.iter().map(EnrichedResult::to_row).collect(),
            Self::Separate { vector, graph } => vector
                .iter()
                .chain(graph)
                .take(limit)
                .map(EnrichedResult::to_row)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: SearchResults,
    pub timings: StageTimings,
}

/// Hybrid search over whichever sources are configured.
pub struct HybridSearch {
    vector: Option<Box<dyn VectorSource>>,
    graph: Option<GraphRetrieval>,
    store: Box<dyn ContentStore>,
}

impl HybridSearch {
    /// Wire up the collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::NoSourceConfigured`] when neither source is given.
    pub fn new(
        vector: Option<Box<dyn VectorSource>>,
        graph: Option<GraphRetrieval>,
        store: Box<dyn ContentStore>,
    ) -> Result<Self, BraidError> {
        if vector.is_none() && graph.is_none() {
            return Err(BraidError::NoSourceConfigured);
        }

        let search = Self {
            vector,
            graph,
            store,
        };
        info!(capabilities = ?search.capabilities(), "hybrid search ready");
        Ok(search)
    }

    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        Capabilities {
            vector_search_available: self.vector.is_some(),
            knowledge_graph_available: self.graph.is_some(),
        }
    }

    /// Run one hybrid search. Never fails: source and store failures
    /// degrade to fewer (or unenriched) results.
    #[instrument(
        skip(self, request),
        fields(query = %request.query, limit = request.limit, merge_method = %request.merge_method)
    )]
    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        let mut timings = StageTimings::new();
        let policy = request.policy();

        let (vector_hits, graph_hits) =
            timings.timed(STAGE_RETRIEVE, || self.retrieve(request));
        info!(
            vector = vector_hits.len(),
            graph = graph_hits.len(),
            "retrieved candidates"
        );

        let fused = timings.timed(STAGE_FUSE, || {
            fuse(vector_hits, graph_hits, policy, request.limit)
        });

        let results = match fused {
            FusionOutput::Ranked(ranked) => SearchResults::Ranked(
                timings.timed(STAGE_ENRICH, || enrich(ranked, self.store.as_ref())),
            ),
            FusionOutput::Separate { vector, graph } => SearchResults::Separate {
                vector: vector.into_iter().map(Into::into).collect(),
                graph: graph.into_iter().map(Into::into).collect(),
            },
        };

        info!(results = results.len(), "hybrid search complete");
        SearchResponse { results, timings }
    }

    /// Vector-only pipeline: vector lookup, dedup, enrich.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::SourceUnavailable`] when no vector source is
    /// configured, or the source's own error when the lookup fails.
    #[instrument(skip(self))]
    pub fn vector_search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<EnrichedResult>> {
        let source = self
            .vector
            .as_ref()
            .ok_or(BraidError::SourceUnavailable("vector"))?;
        let hits = source.search(query, limit).context("vector search failed")?;
        Ok(self.finish_single_source(hits, Vec::new(), limit))
    }

    /// Graph-only pipeline: entity extraction, graph lookup, dedup, enrich.
    ///
    /// # Errors
    ///
    /// Returns [`BraidError::SourceUnavailable`] when no graph source is
    /// configured, or the collaborator's own error when extraction or the
    /// lookup fails.
    #[instrument(skip(self))]
    pub fn graph_search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<EnrichedResult>> {
        let graph = self
            .graph
            .as_ref()
            .ok_or(BraidError::SourceUnavailable("knowledge graph"))?;

        let entities = graph
            .extractor
            .extract(query)
            .context("entity extraction failed")?;
        if entities.is_empty() {
            info!("no entities in query");
            return Ok(Vec::new());
        }

        let hits = graph
            .source
            .search(&entities, limit)
            .context("knowledge graph search failed")?;
        Ok(self.finish_single_source(Vec::new(), hits, limit))
    }

    fn retrieve(&self, request: &SearchRequest) -> (Vec<Candidate>, Vec<Candidate>) {
        let graph = self.graph.as_ref().filter(|_| !request.vector_only);
        if graph.is_none() {
            debug!(
                vector_only = request.vector_only,
                "skipping entity extraction and knowledge graph search"
            );
        }

        std::thread::scope(|scope| {
            let vector_task = self.vector.as_deref().map(|source| {
                scope.spawn(move || search_vector(source, &request.query, request.limit))
            });
            let graph_task = graph.map(|graph| {
                scope.spawn(move || graph.retrieve(&request.query, request.limit))
            });

            (
                join_leg(vector_task, "vector search"),
                join_leg(graph_task, "knowledge graph search"),
            )
        })
    }

    fn finish_single_source(
        &self,
        vector: Vec<Candidate>,
        graph: Vec<Candidate>,
        limit: usize,
    ) -> Vec<EnrichedResult> {
        let ranked = fuse(vector, graph, FusionPolicy::Interleave, limit).flatten(limit);
        enrich(ranked, self.store.as_ref())
    }
}

/// Join one retrieval leg. A panicking collaborator counts as no hits.
fn join_leg(task: Option<ScopedJoinHandle<'_, Vec<Candidate>>>, leg: &str) -> Vec<Candidate> {
    task.map_or_else(Vec::new, |task| {
        task.join().unwrap_or_else(|_| {
            warn!(leg, "retrieval panicked, continuing without it");
            Vec::new()
        })
    })
}

fn search_vector(source: &dyn VectorSource, query: &str, k: usize) -> Vec<Candidate> {
    match source.search(query, k) {
        Ok(hits) => {
            info!(results = hits.len(), "vector search");
            hits
        }
        Err(err) => {
            warn!("vector search failed, continuing without it: {err:#}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DictionaryExtractor;
    use braid_core::{DocumentRecord, SearchType};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticVector(Vec<Candidate>);

    impl VectorSource for StaticVector {
        fn search(&self, _query: &str, k: usize) -> anyhow::Result<Vec<Candidate>> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    struct BrokenVector;

    impl VectorSource for BrokenVector {
        fn search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<Candidate>> {
            anyhow::bail!("index unreachable")
        }
    }

    struct CountingGraph {
        hits: Vec<Candidate>,
        calls: Arc<AtomicUsize>,
    }

    impl GraphSource for CountingGraph {
        fn search(&self, _entities: &[String], limit: usize) -> anyhow::Result<Vec<Candidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hits.iter().take(limit).cloned().collect())
        }
    }

    struct BrokenGraph;

    impl GraphSource for BrokenGraph {
        fn search(&self, _entities: &[String], _limit: usize) -> anyhow::Result<Vec<Candidate>> {
            anyhow::bail!("bolt connection refused")
        }
    }

    struct PanickingGraph;

    impl GraphSource for PanickingGraph {
        fn search(&self, _entities: &[String], _limit: usize) -> anyhow::Result<Vec<Candidate>> {
            panic!("graph driver crashed")
        }
    }

    struct PanickingVector;

    impl VectorSource for PanickingVector {
        fn search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<Candidate>> {
            panic!("index driver crashed")
        }
    }

    struct BrokenExtractor;

    impl EntityExtractor for BrokenExtractor {
        fn extract(&self, _query: &str) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("completion endpoint timed out")
        }
    }

    struct EmptyStore;

    impl ContentStore for EmptyStore {
        fn lookup_by_ids(&self, _ids: &BTreeSet<String>) -> anyhow::Result<Vec<DocumentRecord>> {
            Ok(Vec::new())
        }

        fn lookup_by_urls(&self, _urls: &BTreeSet<String>) -> anyhow::Result<Vec<DocumentRecord>> {
            Ok(Vec::new())
        }
    }

    fn graph_leg(hits: Vec<Candidate>, calls: &Arc<AtomicUsize>) -> GraphRetrieval {
        GraphRetrieval::new(
            CountingGraph {
                hits,
                calls: Arc::clone(calls),
            },
            DictionaryExtractor::new(["EPA"]),
        )
    }

    fn ranked(response: &SearchResponse) -> &[EnrichedResult] {
        match &response.results {
            SearchResults::Ranked(results) => results,
            SearchResults::Separate { .. } => panic!("expected ranked results"),
        }
    }

    #[test]
    fn no_sources_is_a_startup_error() {
        let err = HybridSearch::new(None, None, Box::new(EmptyStore))
            .err()
            .expect("no sources");
        assert!(matches!(err, BraidError::NoSourceConfigured));
    }

    #[test]
    fn capabilities_reflect_configured_sources() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(None, Some(graph_leg(Vec::new(), &calls)), Box::new(EmptyStore))
            .expect("graph only");
        assert_eq!(
            search.capabilities(),
            Capabilities {
                vector_search_available: false,
                knowledge_graph_available: true,
            }
        );
    }

    #[test]
    fn both_sources_are_fused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(StaticVector(vec![
                Candidate::vector(0.1).with_doc_id("1"),
                Candidate::vector(0.4).with_doc_id("2"),
            ]))),
            Some(graph_leg(
                vec![Candidate::graph(Some(0.9), "EPA", "").with_doc_id("2")],
                &calls,
            )),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("what did the EPA say"));
        let results = ranked(&response);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].result.search_type(), SearchType::Hybrid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(response.timings.get(STAGE_RETRIEVE).is_some());
        assert!(response.timings.get(STAGE_ENRICH).is_some());
    }

    #[test]
    fn vector_only_never_touches_the_graph() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(StaticVector(vec![Candidate::vector(0.1).with_doc_id("1")]))),
            Some(graph_leg(
                vec![Candidate::graph(Some(1.0), "EPA", "").with_doc_id("9")],
                &calls,
            )),
            Box::new(EmptyStore),
        )
        .expect("build");

        let request = SearchRequest::new("EPA rules").with_vector_only(true);
        let response = search.search(&request);
        assert_eq!(ranked(&response).len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn query_without_entities_skips_graph_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(StaticVector(vec![Candidate::vector(0.1).with_doc_id("1")]))),
            Some(graph_leg(Vec::new(), &calls)),
            Box::new(EmptyStore),
        )
        .expect("build");

        search.search(&SearchRequest::new("tax credits"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_vector_source_degrades_to_graph_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(BrokenVector)),
            Some(graph_leg(
                vec![Candidate::graph(Some(1.0), "EPA", "").with_doc_id("9")],
                &calls,
            )),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        let results = ranked(&response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.search_type(), SearchType::KnowledgeGraph);
    }

    fn one_vector_hit() -> Option<Box<dyn VectorSource>> {
        Some(Box::new(StaticVector(vec![Candidate::vector(0.1).with_doc_id("1")])))
    }

    #[test]
    fn failing_graph_source_degrades_to_vector_results() {
        let search = HybridSearch::new(
            one_vector_hit(),
            Some(GraphRetrieval::new(BrokenGraph, DictionaryExtractor::new(["EPA"]))),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        let results = ranked(&response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.search_type(), SearchType::Vector);
    }

    #[test]
    fn failing_extractor_skips_graph_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphRetrieval::new(
            CountingGraph {
                hits: vec![Candidate::graph(Some(1.0), "EPA", "").with_doc_id("9")],
                calls: Arc::clone(&calls),
            },
            BrokenExtractor,
        );
        let search = HybridSearch::new(one_vector_hit(), Some(graph), Box::new(EmptyStore))
            .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        assert_eq!(ranked(&response).len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn both_sources_failing_is_an_empty_ranking() {
        let search = HybridSearch::new(
            Some(Box::new(BrokenVector)),
            Some(GraphRetrieval::new(BrokenGraph, DictionaryExtractor::new(["EPA"]))),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        assert_eq!(response.results, SearchResults::Ranked(Vec::new()));
    }

    #[test]
    fn panicking_graph_source_is_contained() {
        let search = HybridSearch::new(
            one_vector_hit(),
            Some(GraphRetrieval::new(PanickingGraph, DictionaryExtractor::new(["EPA"]))),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        let results = ranked(&response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.search_type(), SearchType::Vector);
    }

    #[test]
    fn panicking_vector_source_is_contained() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(PanickingVector)),
            Some(graph_leg(
                vec![Candidate::graph(Some(1.0), "EPA", "").with_doc_id("9")],
                &calls,
            )),
            Box::new(EmptyStore),
        )
        .expect("build");

        let response = search.search(&SearchRequest::new("EPA"));
        assert_eq!(ranked(&response).len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn separate_policy_returns_both_lists() {
        let calls = Arc::new(AtomicUsize::new(0));
        let search = HybridSearch::new(
            Some(Box::new(StaticVector(vec![Candidate::vector(0.1).with_doc_id("x")]))),
            Some(graph_leg(
                vec![Candidate::graph(Some(1.0), "EPA", "").with_doc_id("y")],
                &calls,
            )),
            Box::new(EmptyStore),
        )
        .expect("build");

        let request = SearchRequest::new("EPA").with_merge_method(MergeMethod::Separate);
        let response = search.search(&request);
        let SearchResults::Separate { vector, graph } = &response.results else {
            panic!("expected separate results");
        };
        assert_eq!(vector.len(), 1);
        assert_eq!(graph.len(), 1);
        assert!(response.timings.get(STAGE_ENRICH).is_none());

        let rows = response.results.to_rows(10);
        assert_eq!(rows[0].doc_id.as_deref(), Some("x"));
        assert_eq!(rows[1].search_type, SearchType::KnowledgeGraph);
    }

    #[test]
    fn single_source_pipelines_require_their_source() {
        let search = HybridSearch::new(
            Some(Box::new(StaticVector(vec![
                Candidate::vector(0.1).with_doc_id("1"),
                Candidate::vector(0.2).with_doc_id("1.0"),
            ]))),
            None,
            Box::new(EmptyStore),
        )
        .expect("build");

        let results = search.vector_search("anything", 5).expect("vector search");
        assert_eq!(results.len(), 1);

        let err = search.graph_search("EPA", 5).expect_err("no graph");
        assert!(matches!(
            err.downcast_ref::<BraidError>(),
            Some(BraidError::SourceUnavailable("knowledge graph"))
        ));
    }

    #[test]
    fn vector_search_surfaces_source_errors() {
        let search = HybridSearch::new(Some(Box::new(BrokenVector)), None, Box::new(EmptyStore))
            .expect("build");
        assert!(search.vector_search("q", 5).is_err());
    }

    #[test]
    fn request_from_config_honours_strictness() {
        let mut config = SearchConfig {
            merge_method: "zipper".into(),
            ..SearchConfig::default()
        };
        let lenient = SearchRequest::from_config("q", &config).expect("lenient");
        assert_eq!(lenient.merge_method, MergeMethod::Interleave);

        config.strict_merge_method = true;
        assert!(matches!(
            SearchRequest::from_config("q", &config),
            Err(BraidError::InvalidPolicy(_))
        ));
    }
}
