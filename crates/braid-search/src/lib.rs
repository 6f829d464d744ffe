#![forbid(unsafe_code)]
//! braid-search library.
//!
//! Hybrid retrieval: candidates from a vector index and a knowledge graph
//! are fused into one ranked list, then enriched from the content store.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types at collaborator seams.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod enrich;
pub mod entities;
pub mod fixture;
pub mod fusion;
pub mod graph;
pub mod hybrid;
pub mod source;
pub mod timing;

pub use enrich::enrich;
pub use entities::{DictionaryExtractor, PromptEntityExtractor, parse_entity_list};
pub use fixture::ReplayVectorSource;
pub use fusion::{FusionOutput, FusionPolicy, MergeMethod, fuse};
pub use graph::MemoryGraph;
pub use hybrid::{
    Capabilities, GraphRetrieval, HybridSearch, SearchRequest, SearchResponse, SearchResults,
};
pub use source::{Completer, EntityExtractor, GraphSource, VectorSource};
pub use timing::StageTimings;
