//! Subcommand handlers and the wiring they share.
//!
//! Every handler resolves the effective config itself, so commands that need
//! no config (`completions`) never touch the filesystem.

pub mod completions;
pub mod enrich;
pub mod fuse;
pub mod lookup;
pub mod search;
pub mod status;
pub mod store;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use braid_core::config::{EffectiveConfig, SearchConfig, resolve_config};
use braid_core::{BraidError, SqliteContentStore};
use braid_search::{
    DictionaryExtractor, GraphRetrieval, HybridSearch, MemoryGraph, MergeMethod,
    ReplayVectorSource, SearchRequest, VectorSource,
};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use crate::output::OutputMode;

/// Per-invocation state handed to every handler.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub output: OutputMode,
    pub project_root: PathBuf,
    /// `--config` override.
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    pub fn config(&self) -> Result<EffectiveConfig> {
        resolve_config(&self.project_root, self.config_path.as_deref())
    }
}

/// `--merge` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeArg {
    /// Convex mix of vector and graph scores.
    Weighted,
    /// Alternate vector and graph hits, vector first.
    Interleave,
    /// Return each source's list on its own.
    Separate,
}

impl From<MergeArg> for MergeMethod {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Weighted => Self::Weighted,
            MergeArg::Interleave => Self::Interleave,
            MergeArg::Separate => Self::Separate,
        }
    }
}

/// Ranking knobs shared by `search` and `fuse`. Unset flags fall back to the
/// `[search]` config table.
#[derive(Args, Debug, Clone, Default)]
pub struct RankingArgs {
    /// Maximum number of results to return.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Merge method.
    #[arg(long, value_enum, value_name = "METHOD", ignore_case = true)]
    pub merge: Option<MergeArg>,

    /// Weight of the vector score in weighted merging, between 0 and 1.
    #[arg(long, value_name = "WEIGHT")]
    pub vector_weight: Option<f64>,
}

impl RankingArgs {
    /// Build a request from config, then apply the flags.
    pub fn request(&self, query: &str, config: &SearchConfig) -> Result<SearchRequest> {
        let mut request = SearchRequest::from_config(query, config)?;
        if let Some(merge) = self.merge {
            request = request.with_merge_method(merge.into());
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        if let Some(weight) = self.vector_weight {
            request = request.with_vector_weight(weight);
        }
        Ok(request)
    }
}

/// Load the configured vector index, if any.
pub fn load_vector(config: &EffectiveConfig) -> Result<Option<ReplayVectorSource>> {
    config
        .project
        .sources
        .vector
        .as_deref()
        .map(ReplayVectorSource::load)
        .transpose()
}

/// Load the configured graph and a dictionary extractor over its entities.
pub fn load_graph(config: &EffectiveConfig) -> Result<Option<(MemoryGraph, DictionaryExtractor)>> {
    let Some(path) = config.project.sources.graph.as_deref() else {
        return Ok(None);
    };
    let graph = MemoryGraph::load(path)?;
    let extractor = DictionaryExtractor::new(graph.entity_names());
    Ok(Some((graph, extractor)))
}

/// Open the content store. A store that was never created is replaced by an
/// empty in-memory one so results pass through unenriched.
pub fn open_store(config: &EffectiveConfig) -> Result<SqliteContentStore> {
    let path = &config.project.sources.store;
    if path.exists() {
        return SqliteContentStore::open(path)
            .map_err(|err| BraidError::StoreUnavailable(format!("{err:#}")).into());
    }

    warn!(path = %path.display(), "content store not found, results will not be enriched");
    SqliteContentStore::open_in_memory().context("open empty content store")
}

/// Wire a [`HybridSearch`] from the configured sources.
pub fn build_search(config: &EffectiveConfig) -> Result<HybridSearch> {
    if !config.has_any_source() {
        return Err(BraidError::NoSourceConfigured.into());
    }

    let vector = load_vector(config)?;
    let graph = load_graph(config)?;
    let store = open_store(config)?;
    info!(
        vector = vector.is_some(),
        graph = graph.is_some(),
        "loaded retrieval sources"
    );

    let search = HybridSearch::new(
        vector.map(|source| Box::new(source) as Box<dyn VectorSource>),
        graph.map(|(graph, extractor)| GraphRetrieval::new(graph, extractor)),
        Box::new(store),
    )?;
    Ok(search)
}

/// Read a whole file, naming it in the error.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
