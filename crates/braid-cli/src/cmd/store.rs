//! `braid store`: manage the SQLite content store.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use braid_core::SqliteContentStore;
use braid_core::store::sqlite::import_json;
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use super::{CommandContext, read_file};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    #[command(
        about = "Load document records into the content store",
        long_about = "Insert or replace document records from a JSON array. Each record needs an \
                      integer `id`; `url`, `title`, `summary`, `source_name` and `subsource_name` are optional.",
        after_help = "EXAMPLES:\n    # Import records\n    braid store import documents.json"
    )]
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON array of document records.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    store: String,
    imported: usize,
    documents: u64,
}

/// Execute a `braid store` subcommand.
pub fn run_store(command: &StoreCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        StoreCommand::Import(args) => run_import(args, ctx),
    }
}

fn run_import(args: &ImportArgs, ctx: &CommandContext) -> Result<()> {
    let json = read_file(&args.file)?;
    let config = ctx.config()?;
    let path = &config.project.sources.store;

    let store = SqliteContentStore::open(path)?;
    let imported = import_json(&store, &json)
        .with_context(|| format!("failed to import {}", args.file.display()))?;
    let documents = store.count()?;
    info!(imported, documents, "content store import complete");

    let report = ImportReport {
        store: path.display().to_string(),
        imported,
        documents,
    };
    render_mode(ctx.output, &report, render_text, render_pretty)
}

fn render_text(report: &ImportReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "imported={} documents={}", report.imported, report.documents)
}

fn render_pretty(report: &ImportReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "store import")?;
    pretty_kv(w, "store", &report.store)?;
    pretty_kv(w, "imported", report.imported.to_string())?;
    pretty_kv(w, "documents", report.documents.to_string())
}
