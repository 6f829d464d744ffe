#![forbid(unsafe_code)]

mod cmd;
mod output;

use braid_core::config::load_user_config;
use braid_search::StageTimings;
use braid_search::timing::timing_enabled_from_env;
use clap::{CommandFactory, Parser, Subcommand};
use cmd::CommandContext;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "braid: hybrid vector and knowledge graph search",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit stage timings to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Project config file (default: .braid/config.toml).
    #[arg(long, global = true, value_name = "FILE", env = "BRAID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self, user_default: Option<&str>) -> OutputMode {
        resolve_output_mode(self.format, self.json, user_default)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(next_help_heading = "Search")]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Search",
        about = "Vector search only",
        long_about = "Query the vector index alone. Hits are deduplicated and enriched; a failing index is an error.",
        after_help = "EXAMPLES:\n    # Nearest documents\n    braid vector \"ozone standards\" -n 5"
    )]
    Vector(cmd::lookup::LookupArgs),

    #[command(
        next_help_heading = "Search",
        about = "Knowledge graph search only",
        long_about = "Extract entities from the query and walk the knowledge graph from them. Hits are deduplicated and enriched.",
        after_help = "EXAMPLES:\n    # Documents connected to an entity\n    braid graph \"What has the EPA issued?\""
    )]
    Graph(cmd::lookup::LookupArgs),

    #[command(next_help_heading = "Offline")]
    Fuse(cmd::fuse::FuseArgs),

    #[command(next_help_heading = "Offline")]
    Enrich(cmd::enrich::EnrichArgs),

    #[command(next_help_heading = "Project")]
    Status(cmd::status::StatusArgs),

    #[command(next_help_heading = "Project", about = "Manage the content store")]
    Store {
        #[command(subcommand)]
        command: cmd::store::StoreCommand,
    },

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    braid completions bash\n\n    # Generate zsh completions\n    braid completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BRAID_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "braid=debug,info"
        } else if verbose {
            "braid=info,warn"
        } else {
            "braid=warn"
        })
    });

    let format = env::var("BRAID_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, ctx: &CommandContext, report: &mut StageTimings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Search(ref args) => cmd::search::run_search(args, ctx, report),
        Commands::Vector(ref args) => {
            report.timed("vector", || cmd::lookup::run_vector(args, ctx))
        }
        Commands::Graph(ref args) => report.timed("graph", || cmd::lookup::run_graph(args, ctx)),
        Commands::Fuse(ref args) => report.timed("fuse", || cmd::fuse::run_fuse(args, ctx)),
        Commands::Enrich(ref args) => {
            report.timed("enrich", || cmd::enrich::run_enrich(args, ctx))
        }
        Commands::Status(ref args) => cmd::status::run_status(args, ctx),
        Commands::Store { ref command } => {
            report.timed("store", || cmd::store::run_store(command, ctx))
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn print_timing_report(report: &StageTimings) -> anyhow::Result<()> {
    if report.is_empty() {
        eprintln!("timing report: no samples recorded");
        return Ok(());
    }
    eprintln!("timing report:");
    eprintln!("{}", report.display_table());
    eprintln!("timing report (json):");
    eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user_output = match load_user_config() {
        Ok(user) => user.output,
        Err(err) => {
            warn!("ignoring user config: {err:#}");
            None
        }
    };
    let output = cli.output_mode(user_output.as_deref());
    let timing_enabled = cli.timing || timing_enabled_from_env();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            let error = CliError::new(format!("cannot read working directory: {err}"));
            let _ = render_error(output, &error);
            return ExitCode::FAILURE;
        }
    };
    let ctx = CommandContext {
        output,
        project_root,
        config_path: cli.config.clone(),
    };

    let mut report = StageTimings::new();
    let result = run(cli, &ctx, &mut report);

    if timing_enabled {
        print_timing_report(&report)
            .unwrap_or_else(|err| warn!("failed to print timing report: {err:#}"));
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = render_error(output, &CliError::from_anyhow(&err));
            ExitCode::FAILURE
        }
    }
}
