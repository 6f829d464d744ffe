#![forbid(unsafe_code)]
//! braid-core library.
//!
//! Shared vocabulary for the hybrid retrieval pipeline: the hit types that
//! flow from sources through fusion and enrichment, the identity rules used
//! to deduplicate them, configuration, and the content store.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types; typed failures live in [`error`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod store;

pub use error::{BraidError, ErrorCode};
pub use identity::{IdentityKey, normalize_doc_id};
pub use model::{
    Candidate, CandidateRecord, EnrichedResult, FusedResult, GraphMatch, Origin, ResultRow,
    SearchType, Signal,
};
pub use store::{ContentStore, DocumentRecord, SqliteContentStore};
