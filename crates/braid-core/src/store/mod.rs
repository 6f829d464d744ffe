//! System-of-record content store.
//!
//! Search results only carry enough metadata to rank; full summaries and
//! canonical titles live in the content store and are attached after fusion.

pub mod sqlite;

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

pub use sqlite::SqliteContentStore;

/// One document as held by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(deserialize_with = "de_record_id")]
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub subsource_name: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Batched lookups against the system of record.
///
/// Both methods take the whole batch at once; the enricher issues at most
/// one call of each kind per request. Implementations return only the
/// records they found, in any order.
pub trait ContentStore: Send + Sync {
    /// Fetch records whose primary key is in `ids` (normalized integer strings).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn lookup_by_ids(&self, ids: &BTreeSet<String>) -> Result<Vec<DocumentRecord>>;

    /// Fetch records whose url is in `urls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn lookup_by_urls(&self, urls: &BTreeSet<String>) -> Result<Vec<DocumentRecord>>;
}

fn de_record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RecordId {
        Text(String),
        Int(i64),
    }

    Ok(match RecordId::deserialize(deserializer)? {
        RecordId::Text(text) => text,
        RecordId::Int(int) => int.to_string(),
    })
}
