use std::collections::{BTreeSet, HashSet};

use braid_core::{Candidate, ContentStore, DocumentRecord, FusedResult, Origin};
use braid_search::enrich;
use braid_search::fusion::{FusionOutput, FusionPolicy, fuse};
use proptest::prelude::*;

/// Ids drawn from a small pool so collisions are common, spelled the ways
/// upstream sources spell them.
fn arb_doc_id() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        6 => (1_u8..6, 0_u8..3).prop_map(|(n, spelling)| Some(match spelling {
            0 => n.to_string(),
            1 => format!("{n}.0"),
            _ => format!(" {n} "),
        })),
    ]
}

fn arb_url() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (1_u8..6).prop_map(|n| Some(format!("https://docs.example.gov/{n}"))),
    ]
}

fn arb_vector_hit() -> impl Strategy<Value = Candidate> {
    (arb_doc_id(), arb_url(), 0.0_f64..2.0).prop_map(|(doc_id, url, distance)| {
        let mut candidate = Candidate::vector(distance);
        candidate.doc_id = doc_id;
        candidate.url = url;
        candidate
    })
}

fn arb_graph_hit() -> impl Strategy<Value = Candidate> {
    (arb_doc_id(), arb_url(), proptest::option::of(0.0_f64..=1.0)).prop_map(
        |(doc_id, url, relevance)| {
            let mut candidate = Candidate::graph(relevance, "EPA", "");
            candidate.doc_id = doc_id;
            candidate.url = url;
            candidate
        },
    )
}

fn ranked(output: FusionOutput) -> Vec<FusedResult> {
    match output {
        FusionOutput::Ranked(results) => results,
        FusionOutput::Separate { .. } => panic!("expected a ranked list"),
    }
}

fn assert_unique(results: &[FusedResult]) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for result in results {
        let key = result.identity();
        prop_assert!(key.is_some(), "unidentified result survived fusion");
        prop_assert!(seen.insert(key), "duplicate identity {:?}", result.identity());
    }
    Ok(())
}

struct NoStore;

impl ContentStore for NoStore {
    fn lookup_by_ids(&self, _ids: &BTreeSet<String>) -> anyhow::Result<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }

    fn lookup_by_urls(&self, _urls: &BTreeSet<String>) -> anyhow::Result<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn weighted_output_has_unique_identities(
        vector in prop::collection::vec(arb_vector_hit(), 0..12),
        graph in prop::collection::vec(arb_graph_hit(), 0..12),
        weight in 0.0_f64..=1.0,
        limit in 0_usize..15,
    ) {
        let results = ranked(fuse(vector, graph, FusionPolicy::weighted(weight), limit));
        prop_assert!(results.len() <= limit);
        assert_unique(&results)?;
    }

    #[test]
    fn interleave_output_has_unique_identities(
        vector in prop::collection::vec(arb_vector_hit(), 0..12),
        graph in prop::collection::vec(arb_graph_hit(), 0..12),
        limit in 0_usize..15,
    ) {
        let results = ranked(fuse(vector, graph, FusionPolicy::Interleave, limit));
        prop_assert!(results.len() <= limit);
        assert_unique(&results)?;
    }

    #[test]
    fn weighted_scores_are_sorted_descending(
        vector in prop::collection::vec(arb_vector_hit(), 1..12),
        graph in prop::collection::vec(arb_graph_hit(), 1..12),
        weight in 0.0_f64..=1.0,
    ) {
        let results = ranked(fuse(vector, graph, FusionPolicy::weighted(weight), 50));
        for pair in results.windows(2) {
            let left = pair[0].combined_score.unwrap_or(0.0);
            let right = pair[1].combined_score.unwrap_or(0.0);
            prop_assert!(left >= right, "{left} before {right}");
        }
    }

    /// With all the weight on vectors, vector hits keep the vector ranking.
    #[test]
    fn full_vector_weight_preserves_vector_order(
        count in 1_usize..8,
        graph_ids in prop::collection::vec(1_u8..20, 1..8),
    ) {
        // Distinct, increasing distances: the vector ranking is list order.
        let vector: Vec<Candidate> = (0..count)
            .map(|i| Candidate::vector(0.1 * i as f64).with_doc_id(format!("v{i}")))
            .collect();
        let graph: Vec<Candidate> = graph_ids
            .iter()
            .map(|n| Candidate::graph(Some(1.0), "EPA", "").with_doc_id(n.to_string()))
            .collect();

        let results = ranked(fuse(vector, graph, FusionPolicy::weighted(1.0), 100));
        let vector_ids: Vec<String> = results
            .iter()
            .filter(|r| r.origin() == Origin::Vector)
            .filter_map(|r| r.candidate.doc_id.clone())
            .collect();
        let expected: Vec<String> = (0..count).map(|i| format!("v{i}")).collect();
        prop_assert_eq!(vector_ids, expected);
    }

    /// With all the weight on the graph, graph evidence decides the ranking.
    #[test]
    fn zero_vector_weight_preserves_graph_order(
        vector_ids in prop::collection::vec(1_u8..10, 1..8),
        count in 1_usize..8,
    ) {
        let vector: Vec<Candidate> = vector_ids
            .iter()
            .map(|n| Candidate::vector(0.0).with_doc_id(format!("g{n}")))
            .collect();
        // Distinct, decreasing relevance: the graph ranking is list order.
        let graph: Vec<Candidate> = (0..count)
            .map(|i| {
                Candidate::graph(Some(1.0 / (i as f64 + 1.0)), "EPA", "")
                    .with_doc_id(format!("g{i}"))
            })
            .collect();

        let results = ranked(fuse(vector, graph, FusionPolicy::weighted(0.0), 100));
        let graph_backed: Vec<String> = results
            .iter()
            .filter(|r| r.from_knowledge_graph)
            .filter_map(|r| r.candidate.doc_id.clone())
            .collect();
        let expected: Vec<String> = (0..count).map(|i| format!("g{i}")).collect();
        prop_assert_eq!(&graph_backed, &expected);

        // Graph-backed hits all rank ahead of vector-only hits.
        let first_plain = results.iter().position(|r| !r.from_knowledge_graph);
        if let Some(first_plain) = first_plain {
            prop_assert!(results[first_plain..].iter().all(|r| !r.from_knowledge_graph));
        }
    }

    #[test]
    fn enrichment_preserves_order(
        vector in prop::collection::vec(arb_vector_hit(), 0..12),
    ) {
        let before: Vec<_> = vector.iter().map(|c| (c.doc_id.clone(), c.url.clone())).collect();
        let after: Vec<_> = enrich(vector, &NoStore)
            .into_iter()
            .map(|r| (r.result.candidate.doc_id, r.result.candidate.url))
            .collect();
        prop_assert_eq!(before, after);
    }
}
