//! Round-robin interleaving of the two sources.

use std::collections::HashSet;

use braid_core::{Candidate, FusedResult};

/// Alternate vector and graph hits, vector first, skipping identities
/// already emitted.
///
/// Each turn pulls exactly one hit from each live source; a hit whose
/// identity was already emitted consumes that source's turn. A source that
/// runs dry is marked exhausted and skipped from then on. The merge stops at
/// `limit` results or when both sources are exhausted. No scores are
/// computed.
#[must_use]
pub fn interleave(vector: Vec<Candidate>, graph: Vec<Candidate>, limit: usize) -> Vec<FusedResult> {
    let mut out = Vec::with_capacity(limit.min(vector.len() + graph.len()));
    let mut seen = HashSet::new();

    let mut vector = vector.into_iter();
    let mut graph = graph.into_iter();
    let mut vector_exhausted = false;
    let mut graph_exhausted = false;

    while out.len() < limit && !(vector_exhausted && graph_exhausted) {
        for (cursor, exhausted) in [
            (&mut vector, &mut vector_exhausted),
            (&mut graph, &mut graph_exhausted),
        ] {
            if *exhausted || out.len() >= limit {
                continue;
            }

            match cursor.next() {
                Some(candidate) => {
                    if candidate.identity().is_some_and(|key| seen.insert(key)) {
                        out.push(FusedResult::passthrough(candidate));
                    }
                }
                None => *exhausted = true,
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::Origin;

    fn v(id: &str) -> Candidate {
        Candidate::vector(0.2).with_doc_id(id)
    }

    fn g(id: &str) -> Candidate {
        Candidate::graph(Some(1.0), "EPA", "").with_doc_id(id)
    }

    fn ids(results: &[FusedResult]) -> Vec<&str> {
        results
            .iter()
            .map(|r| r.candidate.doc_id.as_deref().unwrap_or("?"))
            .collect()
    }

    #[test]
    fn shared_identity_appears_once_at_first_occurrence() {
        let out = interleave(vec![v("a"), v("b"), v("c")], vec![g("b"), g("d")], 10);
        assert_eq!(ids(&out), vec!["a", "b", "d", "c"]);
        assert_eq!(out[1].origin(), Origin::Graph);
        assert!(out.iter().all(|r| r.combined_score.is_none()));
    }

    #[test]
    fn longer_source_drains_after_the_other_runs_dry() {
        let out = interleave(vec![v("1")], vec![g("2"), g("3"), g("4")], 10);
        assert_eq!(ids(&out), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn stops_at_limit_mid_turn() {
        let out = interleave(vec![v("1"), v("3")], vec![g("2"), g("4")], 3);
        assert_eq!(ids(&out), vec!["1", "2", "3"]);
    }

    #[test]
    fn all_duplicates_terminates() {
        let out = interleave(vec![v("x"), v("x"), v("x")], vec![g("x"), g("x")], 10);
        assert_eq!(ids(&out), vec!["x"]);
    }

    #[test]
    fn zero_limit_is_empty() {
        assert!(interleave(vec![v("1")], vec![g("2")], 0).is_empty());
    }
}
