//! `braid vector` and `braid graph`: one source, deduplicated and enriched.
//!
//! Unlike `braid search`, a failing source is an error here.

use anyhow::{Result, bail};
use braid_core::EnrichedResult;
use clap::Args;

use super::{CommandContext, build_search};
use crate::output::{ResultsOutput, render_results};

/// Arguments shared by the single-source commands.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Free-text query.
    pub query: String,

    /// Maximum number of results to return.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Execute `braid vector <query>`.
pub fn run_vector(args: &LookupArgs, ctx: &CommandContext) -> Result<()> {
    run_lookup(args, ctx, |search, query, limit| search.vector_search(query, limit))
}

/// Execute `braid graph <query>`.
pub fn run_graph(args: &LookupArgs, ctx: &CommandContext) -> Result<()> {
    run_lookup(args, ctx, |search, query, limit| search.graph_search(query, limit))
}

fn run_lookup(
    args: &LookupArgs,
    ctx: &CommandContext,
    lookup: impl FnOnce(&braid_search::HybridSearch, &str, usize) -> Result<Vec<EnrichedResult>>,
) -> Result<()> {
    if args.query.trim().is_empty() {
        bail!("search query must not be empty");
    }

    let config = ctx.config()?;
    let limit = args.limit.unwrap_or(config.project.search.limit);
    let search = build_search(&config)?;

    let rows = lookup(&search, &args.query, limit)?
        .iter()
        .map(EnrichedResult::to_row)
        .collect();
    render_results(ctx.output, &ResultsOutput::new(Some(&args.query), rows))
}
