//! Replay of captured vector hits.
//!
//! The embedding index is an external service. [`ReplayVectorSource`] stands
//! in for it by serving a recorded list of hits, which keeps the whole
//! pipeline runnable offline and in tests.

use std::path::Path;

use anyhow::{Context, Result};
use braid_core::{Candidate, CandidateRecord, Origin};
use tracing::debug;

use crate::source::VectorSource;

/// Title given to hits that arrive without one.
pub const UNTITLED: &str = "Untitled";

/// Serves the same recorded hits for every query.
#[derive(Debug, Clone, Default)]
pub struct ReplayVectorSource {
    hits: Vec<Candidate>,
}

impl ReplayVectorSource {
    /// Build from already-parsed records, closest first.
    #[must_use]
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        let hits = records
            .into_iter()
            .map(|record| {
                let mut candidate = record.into_candidate(Origin::Vector);
                if candidate.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    candidate.title = Some(UNTITLED.to_string());
                }
                candidate
            })
            .collect();
        Self { hits }
    }

    /// Parse a JSON array of candidate records.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not an array of records.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<CandidateRecord> =
            serde_json::from_str(json).context("parse vector hits")?;
        Ok(Self::new(records))
    }

    /// Load a JSON array of candidate records from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read vector hits {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("load vector hits {}", path.display()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl VectorSource for ReplayVectorSource {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        let hits: Vec<Candidate> = self.hits.iter().take(k).cloned().collect();
        debug!(query, k, returned = hits.len(), "replayed vector hits");
        Ok(hits)
    }
}
