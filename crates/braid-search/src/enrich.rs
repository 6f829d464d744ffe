//! Attach summaries and canonical titles from the content store.
//!
//! Enrichment runs after ranking and never reorders. Each request costs at
//! most two batched store calls: one by normalized id, then one by url for
//! the results the first call did not resolve. A failing call is logged and
//! the affected results pass through without summaries.

use std::collections::{BTreeSet, HashMap};

use braid_core::{ContentStore, DocumentRecord, EnrichedResult, normalize_doc_id};
use tracing::{debug, info, warn};

/// Enrich `results` against `store`, preserving input order.
///
/// Accepts anything convertible to [`EnrichedResult`]: raw candidates, fused
/// results, or results that were already enriched. A matched record with a
/// summary replaces the current summary; a missing title or `doc_id` is
/// backfilled from the record. Unmatched results are returned as they came.
pub fn enrich<R, S>(results: Vec<R>, store: &S) -> Vec<EnrichedResult>
where
    R: Into<EnrichedResult>,
    S: ContentStore + ?Sized,
{
    let mut results: Vec<EnrichedResult> = results.into_iter().map(Into::into).collect();
    if results.is_empty() {
        return results;
    }

    let normalized: Vec<Option<String>> = results.iter().map(normalized_id).collect();
    let ids: BTreeSet<String> = normalized.iter().flatten().cloned().collect();
    let has_url = results.iter().any(|r| result_url(r).is_some());

    if ids.is_empty() && !has_url {
        warn!("no usable document ids or urls in results, skipping enrichment");
        return results;
    }

    let mut by_id: HashMap<String, DocumentRecord> = HashMap::new();
    let mut by_url: HashMap<String, DocumentRecord> = HashMap::new();

    if !ids.is_empty() {
        for record in fetch("id", || store.lookup_by_ids(&ids)) {
            index_record(record, &mut by_id, &mut by_url);
        }
    }

    let urls: BTreeSet<String> = results
        .iter()
        .zip(&normalized)
        .filter(|&(_, id)| id.as_ref().is_none_or(|id| !by_id.contains_key(id)))
        .filter_map(|(result, _)| result_url(result))
        .filter(|url| !by_url.contains_key(*url))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        debug!("every result resolved by id, skipping url lookup");
    } else {
        for record in fetch("url", || store.lookup_by_urls(&urls)) {
            index_record(record, &mut by_id, &mut by_url);
        }
    }

    let mut matched = 0_usize;
    for (result, id) in results.iter_mut().zip(&normalized) {
        let record = id
            .as_ref()
            .and_then(|id| by_id.get(id))
            .or_else(|| result_url(result).and_then(|url| by_url.get(url)));

        if let Some(record) = record {
            apply_record(result, record);
            matched += 1;
        }
    }

    info!(results = results.len(), matched, "enriched results");
    results
}

fn fetch(
    kind: &'static str,
    lookup: impl FnOnce() -> anyhow::Result<Vec<DocumentRecord>>,
) -> Vec<DocumentRecord> {
    match lookup() {
        Ok(records) => {
            debug!(kind, found = records.len(), "content store lookup");
            records
        }
        Err(err) => {
            warn!(kind, "content store lookup failed, returning results without summaries: {err:#}");
            Vec::new()
        }
    }
}

fn index_record(
    record: DocumentRecord,
    by_id: &mut HashMap<String, DocumentRecord>,
    by_url: &mut HashMap<String, DocumentRecord>,
) {
    if let Some(url) = record.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        by_url.entry(url.to_string()).or_insert_with(|| record.clone());
    }
    if let Some(id) = normalize_doc_id(&record.id) {
        by_id.entry(id).or_insert(record);
    }
}

/// The normalized id used for lookup. Opaque ids are logged and left to
/// url matching.
fn normalized_id(result: &EnrichedResult) -> Option<String> {
    let raw = result
        .result
        .candidate
        .doc_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?;

    let id = normalize_doc_id(raw);
    if id.is_none() {
        warn!(doc_id = raw, "doc_id is not numeric, matching by url only");
    }
    id
}

fn result_url(result: &EnrichedResult) -> Option<&str> {
    result
        .result
        .candidate
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
}

fn apply_record(result: &mut EnrichedResult, record: &DocumentRecord) {
    if record.summary.is_some() {
        result.summary.clone_from(&record.summary);
    }

    let candidate = &mut result.result.candidate;
    if is_blank(candidate.title.as_deref()) && !is_blank(record.title.as_deref()) {
        candidate.title.clone_from(&record.title);
    }
    if is_blank(candidate.doc_id.as_deref()) && !record.id.trim().is_empty() {
        candidate.doc_id = Some(record.id.trim().to_string());
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
