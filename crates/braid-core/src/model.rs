//! Retrieval hits as they move through the pipeline.
//!
//! A [`Candidate`] is one hit from one source. The fuser promotes candidates
//! to [`FusedResult`]s, and the enricher wraps those in [`EnrichedResult`]s.
//! Source-specific fields live in [`Signal`], so a vector hit has no graph
//! fields to read by mistake and vice versa.
//!
//! [`CandidateRecord`] and [`ResultRow`] are the flat JSON shapes used at
//! the edges (fixture files, CLI output).

use serde::{Deserialize, Deserializer, Serialize};

use crate::identity::IdentityKey;

/// Which retrieval source produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Vector,
    Graph,
}

impl Origin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
        }
    }
}

/// The label exposed to callers for each result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Vector,
    KnowledgeGraph,
    Hybrid,
}

impl SearchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::KnowledgeGraph => "knowledge_graph",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Graph-side evidence: which entity matched and how the document connects to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphMatch {
    /// Relevance derived from path length; `None` when the source gave none.
    pub relevance_score: Option<f64>,
    pub matched_entity: String,
    /// Human-readable relationship path, e.g. `Connected to 'EPA' via: ISSUED`.
    pub graph_context: String,
}

/// Source-specific scoring fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Distance-like similarity from the vector index (lower is closer, unnormalized).
    Vector { similarity_score: f64 },
    Graph(GraphMatch),
}

/// One retrieval hit from a single source, before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub doc_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub subsource: Option<String>,
    pub signal: Signal,
}

impl Candidate {
    /// A vector hit with the given similarity distance.
    #[must_use]
    pub const fn vector(similarity_score: f64) -> Self {
        Self::with_signal(Signal::Vector { similarity_score })
    }

    /// A graph hit.
    #[must_use]
    pub fn graph(
        relevance_score: Option<f64>,
        matched_entity: impl Into<String>,
        graph_context: impl Into<String>,
    ) -> Self {
        Self::with_signal(Signal::Graph(GraphMatch {
            relevance_score,
            matched_entity: matched_entity.into(),
            graph_context: graph_context.into(),
        }))
    }

    const fn with_signal(signal: Signal) -> Self {
        Self {
            doc_id: None,
            url: None,
            title: None,
            source: None,
            subsource: None,
            signal,
        }
    }

    #[must_use]
    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>, subsource: Option<String>) -> Self {
        self.source = Some(source.into());
        self.subsource = subsource;
        self
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        match self.signal {
            Signal::Vector { .. } => Origin::Vector,
            Signal::Graph(_) => Origin::Graph,
        }
    }

    /// Identity key used for deduplication; `None` marks a malformed candidate.
    #[must_use]
    pub fn identity(&self) -> Option<IdentityKey> {
        IdentityKey::resolve(self.doc_id.as_deref(), self.url.as_deref())
    }

    #[must_use]
    pub const fn similarity_score(&self) -> Option<f64> {
        match self.signal {
            Signal::Vector { similarity_score } => Some(similarity_score),
            Signal::Graph(_) => None,
        }
    }

    #[must_use]
    pub const fn graph_match(&self) -> Option<&GraphMatch> {
        match &self.signal {
            Signal::Graph(graph) => Some(graph),
            Signal::Vector { .. } => None,
        }
    }
}

/// A candidate promoted with fusion metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub candidate: Candidate,
    /// Set only by the weighted policy when both sources contributed hits.
    pub combined_score: Option<f64>,
    pub from_knowledge_graph: bool,
    /// Graph evidence merged into a vector hit that both sources returned.
    pub merged_graph: Option<GraphMatch>,
}

impl FusedResult {
    /// Wrap a candidate without scoring it.
    #[must_use]
    pub fn passthrough(candidate: Candidate) -> Self {
        let from_knowledge_graph = candidate.origin() == Origin::Graph;
        Self {
            candidate,
            combined_score: None,
            from_knowledge_graph,
            merged_graph: None,
        }
    }

    #[must_use]
    pub fn scored(candidate: Candidate, combined_score: f64) -> Self {
        Self {
            combined_score: Some(combined_score),
            ..Self::passthrough(candidate)
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<IdentityKey> {
        self.candidate.identity()
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.candidate.origin()
    }

    #[must_use]
    pub const fn search_type(&self) -> SearchType {
        match (self.candidate.origin(), &self.merged_graph) {
            (Origin::Graph, _) => SearchType::KnowledgeGraph,
            (Origin::Vector, Some(_)) => SearchType::Hybrid,
            (Origin::Vector, None) => SearchType::Vector,
        }
    }

    /// Graph evidence from either the hit itself or a merged graph hit.
    #[must_use]
    pub fn graph_evidence(&self) -> Option<&GraphMatch> {
        self.merged_graph
            .as_ref()
            .or_else(|| self.candidate.graph_match())
    }
}

impl From<Candidate> for FusedResult {
    fn from(candidate: Candidate) -> Self {
        Self::passthrough(candidate)
    }
}

/// A fused result with content attached from the system of record.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedResult {
    pub result: FusedResult,
    pub summary: Option<String>,
}

impl EnrichedResult {
    #[must_use]
    pub fn identity(&self) -> Option<IdentityKey> {
        self.result.identity()
    }

    /// Flatten into the row shape exposed to callers.
    #[must_use]
    pub fn to_row(&self) -> ResultRow {
        let candidate = &self.result.candidate;
        let graph = self.result.graph_evidence();
        ResultRow {
            doc_id: candidate.doc_id.clone(),
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            source: candidate.source.clone(),
            subsource: candidate.subsource.clone(),
            summary: self.summary.clone(),
            search_type: self.result.search_type(),
            similarity_score: candidate.similarity_score(),
            relevance_score: graph.and_then(|g| g.relevance_score),
            combined_score: self.result.combined_score,
            matched_entity: graph.map(|g| g.matched_entity.clone()),
            graph_context: graph.map(|g| g.graph_context.clone()),
            knowledge_graph: self.result.from_knowledge_graph,
        }
    }
}

impl From<FusedResult> for EnrichedResult {
    fn from(result: FusedResult) -> Self {
        Self {
            result,
            summary: None,
        }
    }
}

impl From<Candidate> for EnrichedResult {
    fn from(candidate: Candidate) -> Self {
        FusedResult::passthrough(candidate).into()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Flat JSON form of a candidate as sources and fixture files emit it.
///
/// `doc_id` may arrive as a string, integer or float. The legacy field
/// names `source_name`, `subsource_name` and `context` are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "de_loose_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "source_name", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, alias = "subsource_name", skip_serializing_if = "Option::is_none")]
    pub subsource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_entity: Option<String>,
    #[serde(default, alias = "context", skip_serializing_if = "Option::is_none")]
    pub graph_context: Option<String>,
}

impl CandidateRecord {
    /// Build a candidate for the given source. A vector record without a
    /// score is treated as distance `0.0`.
    #[must_use]
    pub fn into_candidate(self, origin: Origin) -> Candidate {
        let signal = match origin {
            Origin::Vector => Signal::Vector {
                similarity_score: self.similarity_score.unwrap_or(0.0),
            },
            Origin::Graph => Signal::Graph(GraphMatch {
                relevance_score: self.relevance_score,
                matched_entity: self.matched_entity.unwrap_or_default(),
                graph_context: self.graph_context.unwrap_or_default(),
            }),
        };

        Candidate {
            doc_id: self.doc_id,
            url: self.url,
            title: self.title,
            source: self.source,
            subsource: self.subsource,
            signal,
        }
    }
}

impl From<&Candidate> for CandidateRecord {
    fn from(candidate: &Candidate) -> Self {
        let graph = candidate.graph_match();
        Self {
            doc_id: candidate.doc_id.clone(),
            url: candidate.url.clone(),
            title: candidate.title.clone(),
            source: candidate.source.clone(),
            subsource: candidate.subsource.clone(),
            similarity_score: candidate.similarity_score(),
            relevance_score: graph.and_then(|g| g.relevance_score),
            matched_entity: graph.map(|g| g.matched_entity.clone()),
            graph_context: graph.map(|g| g.graph_context.clone()),
        }
    }
}

/// One result row as exposed to callers. `doc_id` is always a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default, deserialize_with = "de_loose_id")]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "source_name")]
    pub source: Option<String>,
    #[serde(default, alias = "subsource_name")]
    pub subsource: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub search_type: SearchType,
    #[serde(default)]
    pub similarity_score: Option<f64>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub combined_score: Option<f64>,
    #[serde(default)]
    pub matched_entity: Option<String>,
    #[serde(default)]
    pub graph_context: Option<String>,
    #[serde(default)]
    pub knowledge_graph: bool,
}

impl From<ResultRow> for EnrichedResult {
    fn from(row: ResultRow) -> Self {
        let graph = GraphMatch {
            relevance_score: row.relevance_score,
            matched_entity: row.matched_entity.unwrap_or_default(),
            graph_context: row.graph_context.unwrap_or_default(),
        };
        let (signal, merged_graph) = match row.search_type {
            SearchType::KnowledgeGraph => (Signal::Graph(graph), None),
            SearchType::Hybrid => (
                Signal::Vector {
                    similarity_score: row.similarity_score.unwrap_or(0.0),
                },
                Some(graph),
            ),
            SearchType::Vector => (
                Signal::Vector {
                    similarity_score: row.similarity_score.unwrap_or(0.0),
                },
                None,
            ),
        };

        Self {
            result: FusedResult {
                candidate: Candidate {
                    doc_id: row.doc_id,
                    url: row.url,
                    title: row.title,
                    source: row.source,
                    subsource: row.subsource,
                    signal,
                },
                combined_score: row.combined_score,
                from_knowledge_graph: row.knowledge_graph,
                merged_graph,
            },
            summary: row.summary,
        }
    }
}

/// Accept ids written as strings or JSON numbers; `7`, `7.0` and `"7"` all
/// deserialize to text. Normalization happens later, at comparison time.
fn de_loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LooseId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(
        Option::<LooseId>::deserialize(deserializer)?.map(|id| match id {
            LooseId::Text(text) => text,
            LooseId::Int(int) => int.to_string(),
            LooseId::Float(float) => float.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_follows_signal() {
        assert_eq!(Candidate::vector(0.2).origin(), Origin::Vector);
        assert_eq!(Candidate::graph(None, "EPA", "").origin(), Origin::Graph);
    }

    #[test]
    fn search_type_labels() {
        let vector = FusedResult::passthrough(Candidate::vector(0.1).with_doc_id("1"));
        assert_eq!(vector.search_type(), SearchType::Vector);
        assert!(!vector.from_knowledge_graph);

        let graph = FusedResult::passthrough(Candidate::graph(Some(1.0), "EPA", "").with_doc_id("2"));
        assert_eq!(graph.search_type(), SearchType::KnowledgeGraph);
        assert!(graph.from_knowledge_graph);

        let mut hybrid = vector;
        hybrid.merged_graph = Some(GraphMatch::default());
        assert_eq!(hybrid.search_type(), SearchType::Hybrid);
        assert_eq!(SearchType::Hybrid.as_str(), "hybrid");
    }

    #[test]
    fn candidate_record_accepts_numeric_ids_and_legacy_names() {
        let json = r#"[
            {"doc_id": 7, "url": "https://a.gov/7", "similarity_score": 0.3},
            {"doc_id": 7.0, "source_name": "EPA", "context": "Connected"},
            {"doc_id": "7", "subsource_name": "Air"}
        ]"#;
        let records: Vec<CandidateRecord> = serde_json::from_str(json).expect("parse records");

        assert_eq!(records[0].doc_id.as_deref(), Some("7"));
        assert_eq!(records[1].doc_id.as_deref(), Some("7"));
        assert_eq!(records[1].source.as_deref(), Some("EPA"));
        assert_eq!(records[1].graph_context.as_deref(), Some("Connected"));
        assert_eq!(records[2].subsource.as_deref(), Some("Air"));

        let keys: Vec<_> = records
            .into_iter()
            .map(|r| r.into_candidate(Origin::Graph).identity())
            .collect();
        assert!(keys.iter().all(|k| *k == Some(IdentityKey::Id("7".into()))));
    }

    #[test]
    fn vector_record_without_score_defaults_to_zero_distance() {
        let candidate = CandidateRecord::default().into_candidate(Origin::Vector);
        assert_eq!(candidate.similarity_score(), Some(0.0));
    }

    #[test]
    fn row_round_trips_hybrid_evidence() {
        let mut fused = FusedResult::scored(
            Candidate::vector(0.2).with_doc_id("5").with_title("Clean Air"),
            0.7,
        );
        fused.from_knowledge_graph = true;
        fused.merged_graph = Some(GraphMatch {
            relevance_score: Some(0.5),
            matched_entity: "EPA".into(),
            graph_context: "Connected to 'EPA' via: ISSUED".into(),
        });
        let enriched = EnrichedResult {
            result: fused,
            summary: Some("Rules for air quality".into()),
        };

        let row = enriched.to_row();
        assert_eq!(row.search_type, SearchType::Hybrid);
        assert_eq!(row.matched_entity.as_deref(), Some("EPA"));
        assert_eq!(row.relevance_score, Some(0.5));
        assert!(row.knowledge_graph);

        let json = serde_json::to_string(&row).expect("serialize row");
        assert!(json.contains("\"search_type\":\"hybrid\""));
        let back: ResultRow = serde_json::from_str(&json).expect("parse row");
        assert_eq!(EnrichedResult::from(back), enriched);
    }
}
