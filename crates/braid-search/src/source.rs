//! Collaborator contracts consumed by the query pipeline.
//!
//! Implementations are blocking and shared across threads; the orchestrator
//! owns them for the life of the process and calls them per request. Every
//! call returns `anyhow::Result` so backends can surface their own failure
//! types. The orchestrator catches those failures at its boundary.

use anyhow::Result;
use braid_core::Candidate;

/// A nearest-neighbour index over document embeddings.
pub trait VectorSource: Send + Sync {
    /// Return up to `k` vector candidates for `query`, closest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be queried.
    fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>>;
}

/// A knowledge graph linking named entities to documents.
pub trait GraphSource: Send + Sync {
    /// Return up to `limit` graph candidates related to any of `entities`.
    ///
    /// Deduplicating its own hits by url is the source's job.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be queried.
    fn search(&self, entities: &[String], limit: usize) -> Result<Vec<Candidate>>;

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "graph"
    }
}

/// Pulls entity surface forms out of a free-text query.
pub trait EntityExtractor: Send + Sync {
    /// Entities mentioned in `query`; empty when there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing model cannot be reached.
    fn extract(&self, query: &str) -> Result<Vec<String>>;
}

/// A text completion backend, such as a hosted language model.
pub trait Completer: Send + Sync {
    /// Complete `prompt`, returning the raw model text.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion request fails.
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: VectorSource + ?Sized> VectorSource for Box<T> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        (**self).search(query, k)
    }
}

impl<T: GraphSource + ?Sized> GraphSource for Box<T> {
    fn search(&self, entities: &[String], limit: usize) -> Result<Vec<Candidate>> {
        (**self).search(entities, limit)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: EntityExtractor + ?Sized> EntityExtractor for Box<T> {
    fn extract(&self, query: &str) -> Result<Vec<String>> {
        (**self).extract(query)
    }
}
