//! Shared output layer for pretty/text/JSON parity across CLI commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `BRAID_FORMAT` env var, then `output` in the user config
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use braid_core::{BraidError, ResultRow, SearchType};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, visual framing).
    Pretty,
    /// Token-efficient plain rows for agents and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.trim().to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from flags, `BRAID_FORMAT`, the user config and
/// TTY detection.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    user_default: Option<&str>,
) -> OutputMode {
    let env_val = std::env::var("BRAID_FORMAT").ok();
    let preferred = env_val.as_deref().or(user_default);
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, preferred, is_tty)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable code, e.g. `E1003`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Typed errors keep their code and hint; anything else prints its chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        err.downcast_ref::<BraidError>()
            .map_or_else(|| Self::new(format!("{err:#}")), Self::from)
    }
}

impl From<&BraidError> for CliError {
    fn from(err: &BraidError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
            error_code: Some(err.error_code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// JSON envelope shared by every command that prints result rows.
#[derive(Debug, Serialize)]
pub struct ResultsOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub count: usize,
    pub results: Vec<ResultRow>,
}

impl ResultsOutput {
    pub fn new(query: Option<&str>, results: Vec<ResultRow>) -> Self {
        Self {
            query: query.map(str::to_string),
            count: results.len(),
            results,
        }
    }
}

/// The score a reader cares about: combined when fused, else the source's own.
pub fn display_score(row: &ResultRow) -> Option<f64> {
    row.combined_score.or(match row.search_type {
        SearchType::KnowledgeGraph => row.relevance_score,
        SearchType::Vector | SearchType::Hybrid => row.similarity_score,
    })
}

fn score_cell(row: &ResultRow) -> String {
    display_score(row).map_or_else(|| "-".to_string(), |score| format!("{score:.3}"))
}

fn text_rows(value: &ResultsOutput, w: &mut dyn Write) -> io::Result<()> {
    if value.results.is_empty() {
        return Ok(());
    }
    writeln!(w, "doc_id  type  score  title  url")?;
    for row in &value.results {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            row.doc_id.as_deref().unwrap_or("-"),
            row.search_type.as_str(),
            score_cell(row),
            row.title.as_deref().unwrap_or("-"),
            row.url.as_deref().unwrap_or("-"),
        )?;
    }
    Ok(())
}

fn pretty_rows(value: &ResultsOutput, w: &mut dyn Write) -> io::Result<()> {
    let heading = value.query.as_ref().map_or_else(
        || format!("{} result(s)", value.count),
        |query| format!("{} result(s) for \"{query}\"", value.count),
    );
    pretty_section(w, &heading)?;
    if value.results.is_empty() {
        writeln!(w, "No results.")?;
        return Ok(());
    }

    for (rank, row) in value.results.iter().enumerate() {
        writeln!(
            w,
            "{:>2}. {}",
            rank + 1,
            row.title.as_deref().unwrap_or("(no title)")
        )?;
        pretty_kv(w, "  type", row.search_type.as_str())?;
        pretty_kv(w, "  score", score_cell(row))?;
        if let Some(ref doc_id) = row.doc_id {
            pretty_kv(w, "  doc", doc_id)?;
        }
        if let Some(ref url) = row.url {
            pretty_kv(w, "  url", url)?;
        }
        if let Some(ref entity) = row.matched_entity {
            pretty_kv(w, "  entity", entity)?;
        }
        if let Some(context) = row.graph_context.as_deref().filter(|c| !c.is_empty()) {
            pretty_kv(w, "  path", context)?;
        }
        if let Some(ref summary) = row.summary {
            pretty_kv(w, "  summary", summary)?;
        }
    }
    Ok(())
}

/// Render result rows in the requested mode.
pub fn render_results(mode: OutputMode, value: &ResultsOutput) -> anyhow::Result<()> {
    render_mode(mode, value, text_rows, pretty_rows)
}
