//! `braid status`: which sources are configured and whether they load.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use braid_search::{Capabilities, MergeMethod};
use chrono::Utc;
use clap::Args;
use serde::Serialize;

use super::{CommandContext, load_graph, load_vector};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
#[command(
    about = "Show configured sources and search defaults",
    after_help = "EXAMPLES:\n    # Check which sources are usable\n    braid status\n\n    # Machine-readable output\n    braid status --format json"
)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceStatus {
    const fn missing() -> Self {
        Self {
            path: None,
            available: false,
            detail: None,
            error: None,
        }
    }

    fn loaded(path: &Path, detail: String) -> Self {
        Self {
            path: Some(path.display().to_string()),
            available: true,
            detail: Some(detail),
            error: None,
        }
    }

    fn failed(path: &Path, err: &anyhow::Error) -> Self {
        Self {
            path: Some(path.display().to_string()),
            available: false,
            detail: None,
            error: Some(format!("{err:#}")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchDefaults {
    pub limit: usize,
    pub vector_weight: f64,
    /// Method requests will actually use.
    pub merge_method: MergeMethod,
    pub strict_merge_method: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub capabilities: Capabilities,
    pub vector: SourceStatus,
    pub graph: SourceStatus,
    pub store: StoreStatus,
    pub search: SearchDefaults,
}

/// Execute `braid status`. Load failures are reported, not returned.
pub fn run_status(_args: &StatusArgs, ctx: &CommandContext) -> Result<()> {
    let config = ctx.config()?;
    let sources = &config.project.sources;

    let vector = match (sources.vector.as_deref(), load_vector(&config)) {
        (Some(path), Ok(Some(index))) => {
            SourceStatus::loaded(path, format!("{} recorded hits", index.len()))
        }
        (Some(path), Err(err)) => SourceStatus::failed(path, &err),
        _ => SourceStatus::missing(),
    };

    let graph = match (sources.graph.as_deref(), load_graph(&config)) {
        (Some(path), Ok(Some((graph, extractor)))) => SourceStatus::loaded(
            path,
            format!(
                "{} entities, {} nodes, {} edges",
                extractor.len(),
                graph.node_count(),
                graph.edge_count()
            ),
        ),
        (Some(path), Err(err)) => SourceStatus::failed(path, &err),
        _ => SourceStatus::missing(),
    };

    let report = StatusReport {
        generated_at: Utc::now().to_rfc3339(),
        config_path: config
            .config_path
            .as_ref()
            .map(|path| path.display().to_string()),
        capabilities: Capabilities {
            vector_search_available: vector.available,
            knowledge_graph_available: graph.available,
        },
        vector,
        graph,
        store: store_status(&sources.store),
        search: SearchDefaults {
            limit: config.project.search.limit,
            vector_weight: config.project.search.vector_weight,
            merge_method: MergeMethod::parse_lenient(&config.project.search.merge_method),
            strict_merge_method: config.project.search.strict_merge_method,
        },
    };

    render_mode(ctx.output, &report, render_text, render_pretty)
}

fn store_status(path: &Path) -> StoreStatus {
    let mut status = StoreStatus {
        path: path.display().to_string(),
        exists: path.exists(),
        documents: None,
        error: None,
    };
    if !status.exists {
        return status;
    }

    match braid_core::SqliteContentStore::open(path).and_then(|store| store.count()) {
        Ok(count) => status.documents = Some(count),
        Err(err) => status.error = Some(format!("{err:#}")),
    }
    status
}

fn source_line(source: &SourceStatus) -> String {
    match (&source.path, &source.detail, &source.error) {
        (None, _, _) => "not configured".to_string(),
        (Some(path), Some(detail), _) => format!("{path} ({detail})"),
        (Some(path), None, Some(error)) => format!("{path} (error: {error})"),
        (Some(path), None, None) => path.clone(),
    }
}

fn store_line(store: &StoreStatus) -> String {
    match (store.documents, &store.error) {
        (Some(count), _) => format!("{} ({count} documents)", store.path),
        (None, Some(error)) => format!("{} (error: {error})", store.path),
        (None, None) => format!("{} (not created)", store.path),
    }
}

fn render_text(report: &StatusReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "vector_search_available={}",
        report.capabilities.vector_search_available
    )?;
    writeln!(
        w,
        "knowledge_graph_available={}",
        report.capabilities.knowledge_graph_available
    )?;
    writeln!(w, "store_documents={}", report.store.documents.unwrap_or(0))?;
    writeln!(w, "merge_method={}", report.search.merge_method)?;
    writeln!(w, "vector_weight={}", report.search.vector_weight)?;
    writeln!(w, "limit={}", report.search.limit)
}

fn render_pretty(report: &StatusReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "braid status")?;
    pretty_kv(
        w,
        "config",
        report.config_path.as_deref().unwrap_or("(defaults)"),
    )?;
    pretty_kv(w, "vector", source_line(&report.vector))?;
    pretty_kv(w, "graph", source_line(&report.graph))?;
    pretty_kv(w, "store", store_line(&report.store))?;
    writeln!(w)?;
    pretty_section(w, "search defaults")?;
    pretty_kv(w, "merge", report.search.merge_method.as_str())?;
    pretty_kv(w, "vector weight", report.search.vector_weight.to_string())?;
    pretty_kv(w, "limit", report.search.limit.to_string())?;
    pretty_kv(w, "checked", &report.generated_at)
}
