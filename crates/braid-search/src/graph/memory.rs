//! A knowledge graph held in memory and queried with `petgraph`.
//!
//! # Fixture format
//!
//! ```json
//! {
//!   "entities":  [{ "id": "epa", "canonical_name": "Environmental Protection Agency" }],
//!   "documents": [{ "id": "d17", "doc_id": 17, "url": "https://epa.gov/17", "title": "..." }],
//!   "relations": [{ "source": "epa", "target": "d17", "kind": "ISSUED" }]
//! }
//! ```
//!
//! Node ids are local to the fixture. Documents accept the same fields as a
//! candidate record (`doc_id`, `url`, `title`, `source_name`, ...).
//!
//! # Query semantics
//!
//! For each requested entity, every entity node whose canonical name equals
//! or contains it (case-insensitive) is expanded one or two hops, ignoring
//! relation direction. Each path ending at a document yields a hit with
//! `relevance_score = 1 / hops` and a context naming the relation kinds along
//! the path. Hits per entity are ordered by path length and cut at `limit`;
//! the combined list is then deduplicated by url and cut at `limit` again.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use braid_core::{Candidate, CandidateRecord, GraphMatch, Origin, Signal};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::source::GraphSource;

#[derive(Debug, Deserialize)]
struct GraphFixture {
    #[serde(default)]
    entities: Vec<EntityNode>,
    #[serde(default)]
    documents: Vec<DocumentNode>,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Clone, Deserialize)]
struct EntityNode {
    id: String,
    #[serde(alias = "name")]
    canonical_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DocumentNode {
    id: String,
    #[serde(flatten)]
    record: CandidateRecord,
}

#[derive(Debug, Deserialize)]
struct Relation {
    source: String,
    target: String,
    #[serde(alias = "type")]
    kind: String,
}

#[derive(Debug, Clone)]
enum Node {
    Entity { name: String, lowercase: String },
    Document(CandidateRecord),
}

/// One path from a matched entity to a document.
struct PathHit {
    hops: u32,
    document: NodeIndex,
    kinds: Vec<String>,
}

/// Undirected entity/document graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    graph: UnGraph<Node, String>,
    entities: Vec<NodeIndex>,
}

impl MemoryGraph {
    /// Parse a graph fixture.
    ///
    /// Relations that name an unknown node are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid fixture.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: GraphFixture = serde_json::from_str(json).context("parse graph fixture")?;

        let mut graph = UnGraph::<Node, String>::default();
        let mut ids: HashMap<String, NodeIndex> = HashMap::new();
        let mut entities = Vec::with_capacity(fixture.entities.len());

        for entity in fixture.entities {
            let lowercase = entity.canonical_name.to_lowercase();
            let idx = graph.add_node(Node::Entity {
                name: entity.canonical_name,
                lowercase,
            });
            entities.push(idx);
            if ids.insert(entity.id.clone(), idx).is_some() {
                warn!(id = entity.id, "duplicate node id in graph fixture, last one wins");
            }
        }
        for document in fixture.documents {
            let idx = graph.add_node(Node::Document(document.record));
            if ids.insert(document.id.clone(), idx).is_some() {
                warn!(id = document.id, "duplicate node id in graph fixture, last one wins");
            }
        }

        for relation in fixture.relations {
            match (ids.get(&relation.source), ids.get(&relation.target)) {
                (Some(&source), Some(&target)) => {
                    graph.add_edge(source, target, relation.kind);
                }
                _ => warn!(
                    source = relation.source,
                    target = relation.target,
                    "relation references an unknown node, skipping"
                ),
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded graph fixture"
        );
        Ok(Self { graph, entities })
    }

    /// Load a graph fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read graph fixture {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("load graph fixture {}", path.display()))
    }

    /// Canonical names of every entity node, in fixture order.
    #[must_use]
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities
            .iter()
            .filter_map(|&idx| match &self.graph[idx] {
                Node::Entity { name, .. } => Some(name.as_str()),
                Node::Document(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn matching_entities(&self, entity: &str) -> Vec<NodeIndex> {
        let needle = entity.to_lowercase();
        self.entities
            .iter()
            .copied()
            .filter(|&idx| match &self.graph[idx] {
                Node::Entity { lowercase, .. } => lowercase.contains(&needle),
                Node::Document(_) => false,
            })
            .collect()
    }

    /// Edges at `node`, in insertion order.
    fn edges_from(&self, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex, &str)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(node)
            .map(|edge| {
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                (edge.id(), other, edge.weight().as_str())
            })
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges
    }

    /// Paths of one or two hops from `start` to any document node.
    fn document_paths(&self, start: NodeIndex) -> Vec<PathHit> {
        let mut hits = Vec::new();
        for (first_edge, middle, first_kind) in self.edges_from(start) {
            if matches!(self.graph[middle], Node::Document(_)) {
                hits.push(PathHit {
                    hops: 1,
                    document: middle,
                    kinds: vec![first_kind.to_string()],
                });
            }
            for (second_edge, end, second_kind) in self.edges_from(middle) {
                if second_edge == first_edge || end == start {
                    continue;
                }
                if matches!(self.graph[end], Node::Document(_)) {
                    hits.push(PathHit {
                        hops: 2,
                        document: end,
                        kinds: vec![first_kind.to_string(), second_kind.to_string()],
                    });
                }
            }
        }
        hits
    }

    fn to_candidate(&self, entity: &str, hit: &PathHit) -> Option<Candidate> {
        let Node::Document(record) = &self.graph[hit.document] else {
            return None;
        };

        let mut candidate = record.clone().into_candidate(Origin::Graph);
        candidate.signal = Signal::Graph(GraphMatch {
            relevance_score: Some(1.0 / f64::from(hit.hops)),
            matched_entity: entity.to_string(),
            graph_context: format!("Connected to '{entity}' via: {}", hit.kinds.join(" -> ")),
        });
        Some(candidate)
    }
}

impl GraphSource for MemoryGraph {
    #[instrument(skip(self), fields(nodes = self.graph.node_count()))]
    fn search(&self, entities: &[String], limit: usize) -> Result<Vec<Candidate>> {
        let mut hits: Vec<(Candidate, Option<String>, NodeIndex)> = Vec::new();

        for entity in entities.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let mut paths: Vec<PathHit> = self
                .matching_entities(entity)
                .into_iter()
                .flat_map(|start| self.document_paths(start))
                .collect();
            paths.sort_by_key(|path| path.hops);

            for path in paths.iter().take(limit) {
                if let Some(candidate) = self.to_candidate(entity, path) {
                    let url = candidate.url.clone().filter(|u| !u.trim().is_empty());
                    hits.push((candidate, url, path.document));
                }
            }
        }

        // Hits without a url are told apart by their document node.
        let mut seen_urls = HashSet::new();
        let mut seen_nodes = HashSet::new();
        let results: Vec<Candidate> = hits
            .into_iter()
            .filter(|(_, url, node)| match url {
                Some(url) => seen_urls.insert(url.clone()),
                None => seen_nodes.insert(*node),
            })
            .map(|(candidate, _, _)| candidate)
            .take(limit)
            .collect();

        info!(?entities, results = results.len(), "knowledge graph search");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "memory graph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "entities": [
            {"id": "epa", "canonical_name": "Environmental Protection Agency"},
            {"id": "caa", "name": "Clean Air Act"},
            {"id": "nasa", "canonical_name": "NASA"}
        ],
        "documents": [
            {"id": "d1", "doc_id": 1, "url": "https://epa.gov/1", "title": "Ozone rule", "source_name": "EPA"},
            {"id": "d2", "doc_id": "2", "url": "https://epa.gov/2", "title": "Air permits"},
            {"id": "d3", "doc_id": 3.0, "url": "https://nasa.gov/3", "title": "Launch"}
        ],
        "relations": [
            {"source": "epa", "target": "d1", "kind": "ISSUED"},
            {"source": "epa", "target": "caa", "kind": "ENFORCES"},
            {"source": "d2", "target": "caa", "type": "CITES"},
            {"source": "nasa", "target": "d3", "kind": "PUBLISHED"},
            {"source": "nasa", "target": "ghost", "kind": "HAUNTS"}
        ]
    }"#;

    fn graph() -> MemoryGraph {
        MemoryGraph::from_json(FIXTURE).expect("parse fixture")
    }

    fn entities(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn loads_nodes_and_skips_dangling_relations() {
        let graph = graph();
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(
            graph.entity_names(),
            vec!["Environmental Protection Agency", "Clean Air Act", "NASA"]
        );
    }

    #[test]
    fn direct_hits_rank_before_two_hop_hits() {
        let hits = graph()
            .search(&entities(&["Protection Agency"]), 10)
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id.as_deref(), Some("1"));
        let direct = hits[0].graph_match().expect("graph hit");
        assert_eq!(direct.relevance_score, Some(1.0));
        assert_eq!(direct.matched_entity, "Protection Agency");
        assert_eq!(direct.graph_context, "Connected to 'Protection Agency' via: ISSUED");

        assert_eq!(hits[1].doc_id.as_deref(), Some("2"));
        let indirect = hits[1].graph_match().expect("graph hit");
        assert_eq!(indirect.relevance_score, Some(0.5));
        assert_eq!(
            indirect.graph_context,
            "Connected to 'Protection Agency' via: ENFORCES -> CITES"
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let hits = graph().search(&entities(&["nasa"]), 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id.as_deref(), Some("3"));
        assert_eq!(hits[0].title.as_deref(), Some("Launch"));
    }

    #[test]
    fn results_are_deduplicated_by_url_across_entities() {
        let hits = graph()
            .search(&entities(&["Clean Air Act", "Environmental Protection Agency"]), 10)
            .expect("search");
        let urls: Vec<_> = hits.iter().filter_map(|h| h.url.as_deref()).collect();
        assert_eq!(urls, vec!["https://epa.gov/2", "https://epa.gov/1"]);
        // First occurrence wins: d2 came from the Clean Air Act entity.
        assert_eq!(
            hits[0].graph_match().map(|g| g.matched_entity.as_str()),
            Some("Clean Air Act")
        );
    }

    #[test]
    fn limit_applies_per_entity_and_overall() {
        let hits = graph()
            .search(&entities(&["Environmental Protection Agency", "NASA"]), 1)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id.as_deref(), Some("1"));
    }

    #[test]
    fn unknown_and_blank_entities_return_nothing() {
        let graph = graph();
        assert!(graph.search(&entities(&["FEMA"]), 10).expect("search").is_empty());
        assert!(graph.search(&entities(&["  "]), 10).expect("search").is_empty());
        assert!(graph.search(&[], 10).expect("search").is_empty());
    }

    #[test]
    fn invalid_fixture_is_an_error() {
        assert!(MemoryGraph::from_json("{\"entities\": 3}").is_err());
    }
}
