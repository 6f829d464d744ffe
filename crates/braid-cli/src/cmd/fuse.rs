//! `braid fuse`: merge two candidate files without touching any source.
//!
//! Each file is a JSON array of candidate records. Ids may be strings or
//! numbers; `source_name`, `subsource_name` and `context` are accepted as
//! field aliases.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use braid_core::{Candidate, CandidateRecord, EnrichedResult, Origin};
use braid_search::fuse;
use clap::Args;
use tracing::info;

use super::{CommandContext, RankingArgs, read_file};
use crate::output::{ResultsOutput, render_results};

#[derive(Args, Debug)]
#[command(
    about = "Fuse vector and graph candidate files into one ranked list",
    after_help = "EXAMPLES:\n    # Weighted merge of two candidate files\n    braid fuse --vector vector.json --graph graph.json\n\n\
                  # Round-robin, top three\n    braid fuse --vector vector.json --graph graph.json --merge interleave -n 3"
)]
pub struct FuseArgs {
    /// JSON array of vector candidates.
    #[arg(long, value_name = "FILE", required_unless_present = "graph")]
    pub vector: Option<PathBuf>,

    /// JSON array of knowledge graph candidates.
    #[arg(long, value_name = "FILE")]
    pub graph: Option<PathBuf>,

    #[command(flatten)]
    pub ranking: RankingArgs,
}

/// Execute `braid fuse`.
pub fn run_fuse(args: &FuseArgs, ctx: &CommandContext) -> Result<()> {
    let config = ctx.config()?;
    let request = args.ranking.request("", &config.project.search)?;

    let vector = read_candidates(args.vector.as_deref(), Origin::Vector)?;
    let graph = read_candidates(args.graph.as_deref(), Origin::Graph)?;
    info!(vector = vector.len(), graph = graph.len(), "fusing candidate files");

    let rows = fuse(vector, graph, request.policy(), request.limit)
        .flatten(request.limit)
        .into_iter()
        .map(|fused| EnrichedResult::from(fused).to_row())
        .collect();
    render_results(ctx.output, &ResultsOutput::new(None, rows))
}

fn read_candidates(path: Option<&Path>, origin: Origin) -> Result<Vec<Candidate>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let records: Vec<CandidateRecord> = serde_json::from_str(&read_file(path)?)
        .with_context(|| format!("failed to parse candidates in {}", path.display()))?;
    Ok(records
        .into_iter()
        .map(|record| record.into_candidate(origin))
        .collect())
}
