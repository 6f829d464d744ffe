//! `braid enrich`: attach store summaries to a saved result file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use braid_core::{EnrichedResult, ResultRow};
use braid_search::enrich;
use clap::Args;
use serde::Deserialize;

use super::{CommandContext, open_store, read_file};
use crate::output::{ResultsOutput, render_results};

#[derive(Args, Debug)]
#[command(
    about = "Enrich a JSON result file from the content store",
    after_help = "EXAMPLES:\n    # Re-enrich saved search output\n    braid search \"ozone\" --format json > hits.json\n    braid enrich hits.json"
)]
pub struct EnrichArgs {
    /// JSON array of result rows, or a `{"results": [...]}` envelope.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultFile {
    Rows(Vec<ResultRow>),
    Envelope { results: Vec<ResultRow> },
}

impl ResultFile {
    fn into_rows(self) -> Vec<ResultRow> {
        match self {
            Self::Rows(rows) | Self::Envelope { results: rows } => rows,
        }
    }
}

/// Execute `braid enrich <file>`.
pub fn run_enrich(args: &EnrichArgs, ctx: &CommandContext) -> Result<()> {
    let rows = serde_json::from_str::<ResultFile>(&read_file(&args.file)?)
        .with_context(|| format!("failed to parse results in {}", args.file.display()))?
        .into_rows();

    let config = ctx.config()?;
    let store = open_store(&config)?;

    let enriched = enrich(rows, &store)
        .iter()
        .map(EnrichedResult::to_row)
        .collect();
    render_results(ctx.output, &ResultsOutput::new(None, enriched))
}
