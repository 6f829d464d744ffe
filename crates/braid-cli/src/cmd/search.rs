//! `braid search`: hybrid search over the vector index and knowledge graph.

use anyhow::bail;
use braid_search::StageTimings;
use clap::Args;

use super::{CommandContext, RankingArgs, build_search};
use crate::output::{ResultsOutput, render_results};

#[derive(Args, Debug)]
#[command(
    about = "Hybrid search across vector and knowledge graph sources",
    long_about = "Run the query against every configured source, fuse the candidates into one \
                  ranked list and enrich it from the content store.\n\n\
                  A failing source is skipped with a warning; the search still answers from the other.",
    after_help = "EXAMPLES:\n    # Weighted hybrid search\n    braid search \"EPA ozone rules\"\n\n\
                  # Favour vector similarity\n    braid search \"EPA ozone rules\" --vector-weight 0.8\n\n\
                  # Round-robin merge, five results\n    braid search \"EPA ozone rules\" --merge interleave -n 5\n\n\
                  # Machine-readable output\n    braid search \"EPA ozone rules\" --format json"
)]
pub struct SearchArgs {
    /// Free-text query.
    pub query: String,

    #[command(flatten)]
    pub ranking: RankingArgs,

    /// Skip entity extraction and the knowledge graph.
    #[arg(long)]
    pub vector_only: bool,
}

/// Execute `braid search <query>`. Stage timings are appended to `report`.
pub fn run_search(
    args: &SearchArgs,
    ctx: &CommandContext,
    report: &mut StageTimings,
) -> anyhow::Result<()> {
    if args.query.trim().is_empty() {
        bail!("search query must not be empty");
    }

    let config = ctx.config()?;
    let request = args
        .ranking
        .request(&args.query, &config.project.search)?
        .with_vector_only(args.vector_only);
    let search = build_search(&config)?;

    let response = search.search(&request);
    report.stages.extend(response.timings.stages.iter().copied());

    let rows = response.results.to_rows(request.limit);
    render_results(ctx.output, &ResultsOutput::new(Some(&args.query), rows))
}
