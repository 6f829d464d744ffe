//! Fusion of vector and knowledge-graph candidates into one ranked list.
//!
//! [`fuse`] is a pure function of its inputs. It drops candidates that
//! have no identity key, short-circuits when either source came back empty,
//! and otherwise applies the requested [`FusionPolicy`]:
//!
//! - **Weighted**: convex score combination, see [`scoring`].
//! - **Interleave**: round-robin alternation, see [`interleave`](mod@interleave).
//! - **Separate**: no fusion; both lists are returned independently truncated.

pub mod interleave;
pub mod policy;
pub mod scoring;

use std::collections::HashSet;

use braid_core::{Candidate, FusedResult, Origin};
use tracing::{debug, info};

pub use interleave::interleave;
pub use policy::{FusionPolicy, MergeMethod};
pub use scoring::{DEFAULT_GRAPH_RELEVANCE, graph_component, vector_component, weighted_merge};

/// What the fuser hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionOutput {
    /// One ordered, deduplicated list.
    Ranked(Vec<FusedResult>),
    /// Each source's own list, truncated, in its native order.
    Separate {
        vector: Vec<FusedResult>,
        graph: Vec<FusedResult>,
    },
}

impl FusionOutput {
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

    /// Collapse into a single list: separate lists are concatenated, vector
    /// first, and truncated to `limit`.
    #[must_use]
    pub fn flatten(self, limit: usize) -> Vec<FusedResult> {
        match self {
            Self::Ranked(results) => results,
            Self::Separate { vector, graph } => {
                vector.into_iter().chain(graph).take(limit).collect()
            }
        }
    }
}

/// Merge vector and graph candidates under `policy`, returning at most
/// `limit` results (per list for [`FusionPolicy::Separate`]).
///
/// When one source returned nothing, the other source's hits pass through
/// unscored, deduplicated, and truncated, whatever the policy. Both empty
/// yields an empty ranked list.
#[must_use]
pub fn fuse(
    vector: Vec<Candidate>,
    graph: Vec<Candidate>,
    policy: FusionPolicy,
    limit: usize,
) -> FusionOutput {
    let vector = drop_unidentified(vector, Origin::Vector);
    let graph = drop_unidentified(graph, Origin::Graph);

    match (vector.is_empty(), graph.is_empty()) {
        (true, true) => {
            info!("no results from either source");
            return FusionOutput::Ranked(Vec::new());
        }
        (true, false) => {
            info!("no vector results, using knowledge graph results only");
            return FusionOutput::Ranked(pass_through(graph, limit));
        }
        (false, true) => {
            info!("no knowledge graph results, using vector results only");
            return FusionOutput::Ranked(pass_through(vector, limit));
        }
        (false, false) => {}
    }

    match policy {
        FusionPolicy::Weighted { vector_weight } => {
            debug!(vector_weight, "weighted merge");
            FusionOutput::Ranked(weighted_merge(vector, graph, vector_weight, limit))
        }
        FusionPolicy::Interleave => {
            debug!("interleave merge");
            FusionOutput::Ranked(interleave(vector, graph, limit))
        }
        FusionPolicy::Separate => {
            debug!("separate lists, no merge");
            FusionOutput::Separate {
                vector: truncate_labelled(vector, limit),
                graph: truncate_labelled(graph, limit),
            }
        }
    }
}

fn drop_unidentified(candidates: Vec<Candidate>, origin: Origin) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|candidate| candidate.identity().is_some())
        .collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        debug!(
            source = origin.as_str(),
            dropped, "dropping candidates with neither doc_id nor url"
        );
    }
    kept
}

/// Single-source output: first occurrence of each identity, unscored.
fn pass_through(candidates: Vec<Candidate>, limit: usize) -> Vec<FusedResult> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| candidate.identity().is_some_and(|key| seen.insert(key)))
        .take(limit)
        .map(FusedResult::passthrough)
        .collect()
}

fn truncate_labelled(candidates: Vec<Candidate>, limit: usize) -> Vec<FusedResult> {
    candidates
        .into_iter()
        .take(limit)
        .map(FusedResult::passthrough)
        .collect()
}
