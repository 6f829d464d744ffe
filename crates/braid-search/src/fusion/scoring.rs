//! Weighted score fusion.
//!
//! The two sources score on different scales: the vector index reports a
//! distance (lower is closer, not bounded above), the graph reports a
//! relevance in `(0, 1]` derived from path length. Each is mapped to a
//! "higher is better" component and combined as a convex mix:
//!
//! ```text
//! vector_component = 1 - min(similarity_score, 1)
//! graph_component  = relevance_score            (0.5 when absent)
//! combined_score   = vector_component * w + graph_component * (1 - w)
//! ```
//!
//! A document returned by both sources gets the sum of both terms. Output
//! is sorted by `combined_score` descending with a stable sort, so ties keep
//! append order: vector hits in source order, then graph-only hits in
//! source order.

use std::cmp::Ordering;
use std::collections::HashMap;

use braid_core::{Candidate, FusedResult, IdentityKey, Origin};
use tracing::debug;

use super::policy::clamp_vector_weight;

/// Graph relevance assumed when a graph hit carries none.
pub const DEFAULT_GRAPH_RELEVANCE: f64 = 0.5;

/// Map a vector distance to a "higher is better" component.
///
/// Over-large distances clamp to `0.0` rather than going negative.
#[must_use]
pub fn vector_component(similarity_score: f64) -> f64 {
    1.0 - similarity_score.min(1.0)
}

/// Graph relevance, defaulting to [`DEFAULT_GRAPH_RELEVANCE`].
#[must_use]
pub fn graph_component(relevance_score: Option<f64>) -> f64 {
    relevance_score
        .filter(|score| score.is_finite())
        .unwrap_or(DEFAULT_GRAPH_RELEVANCE)
}

/// Merge both candidate lists by weighted score.
///
/// Candidates without an identity must already be filtered out. A repeated
/// vector identity keeps its first (best ranked) occurrence; a repeated
/// graph identity adds to the existing entry. `vector_weight` is clamped to
/// `[0, 1]` so neither side ever scores negative.
#[must_use]
pub fn weighted_merge(
    vector: Vec<Candidate>,
    graph: Vec<Candidate>,
    vector_weight: f64,
    limit: usize,
) -> Vec<FusedResult> {
    let vector_weight = clamp_vector_weight(vector_weight);
    let graph_weight = 1.0 - vector_weight;
    let mut merged: Vec<FusedResult> = Vec::with_capacity(vector.len() + graph.len());
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();

    for candidate in vector {
        let Some(key) = candidate.identity() else {
            continue;
        };
        if positions.contains_key(&key) {
            debug!(identity = %key, "dropping repeated vector hit");
            continue;
        }

        let component = vector_component(candidate.similarity_score().unwrap_or(0.0));
        positions.insert(key, merged.len());
        merged.push(FusedResult::scored(candidate, component * vector_weight));
    }

    for candidate in graph {
        let Some(key) = candidate.identity() else {
            continue;
        };
        let evidence = candidate.graph_match().cloned().unwrap_or_default();
        let contribution = graph_component(evidence.relevance_score) * graph_weight;

        if let Some(&idx) = positions.get(&key) {
            let existing = &mut merged[idx];
            existing.combined_score = Some(existing.combined_score.unwrap_or(0.0) + contribution);
            existing.from_knowledge_graph = true;
            if existing.origin() == Origin::Vector {
                existing.merged_graph = Some(evidence);
            }
        } else {
            positions.insert(key, merged.len());
            merged.push(FusedResult::scored(candidate, contribution));
        }
    }

    // `sort_by` is stable: equal scores keep append order.
    merged.sort_by(|a, b| {
        let left = a.combined_score.unwrap_or(0.0);
        let right = b.combined_score.unwrap_or(0.0);
        right.partial_cmp(&left).unwrap_or(Ordering::Equal)
    });
    merged.truncate(limit);
    merged
}
