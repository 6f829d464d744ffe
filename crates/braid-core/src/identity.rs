//! Document identity rules.
//!
//! The two retrieval sources and the content store disagree on how they
//! spell a document id: the vector index stores metadata as text or floats,
//! the graph stores whatever the loader wrote, and the store uses integer
//! primary keys. Everything that compares ids goes through
//! [`normalize_doc_id`] first so `"42"`, `42` and `"42.0"` are one document.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest magnitude a float id may have and still truncate losslessly into `i64`.
const MAX_FLOAT_ID: f64 = 9.0e18;

/// Normalize a numeric-looking document id to its canonical integer form.
///
/// - integers keep their decimal form (`"007"` becomes `"7"`)
/// - decimal text is truncated toward zero (`"42.0"` and `"42.9"` become `"42"`)
/// - blank, non-numeric, non-finite and out-of-range values return `None`
///
/// # Examples
///
/// ```
/// use braid_core::identity::normalize_doc_id;
///
/// assert_eq!(normalize_doc_id("42.0").as_deref(), Some("42"));
/// assert_eq!(normalize_doc_id(" 7 ").as_deref(), Some("7"));
/// assert_eq!(normalize_doc_id("doc-abc"), None);
/// ```
#[must_use]
pub fn normalize_doc_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(int.to_string());
    }

    let float = trimmed.parse::<f64>().ok()?;
    if !float.is_finite() || float.abs() >= MAX_FLOAT_ID {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let int = float.trunc() as i64;
    Some(int.to_string())
}

/// The value used to recognize the same document across sources.
///
/// A document id wins over a url; the two are never compared with each
/// other, so a hit with only a url cannot collide with a hit that has an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IdentityKey {
    Id(String),
    Url(String),
}

impl IdentityKey {
    /// Resolve the identity for a raw `doc_id` / `url` pair.
    ///
    /// Numeric ids are normalized; other non-blank ids are kept as opaque
    /// trimmed text. Returns `None` when neither key is usable.
    #[must_use]
    pub fn resolve(doc_id: Option<&str>, url: Option<&str>) -> Option<Self> {
        if let Some(raw) = doc_id.map(str::trim).filter(|id| !id.is_empty()) {
            let id = normalize_doc_id(raw).unwrap_or_else(|| raw.to_string());
            return Some(Self::Id(id));
        }

        url.map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| Self::Url(url.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(value) | Self::Url(value) => value,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Url(url) => write!(f, "url:{url}"),
        }
    }
}
