//! ticlval CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod run;

use run::Analysis;

#[derive(Parser)]
#[command(name = "ticlval")]
#[command(about = "ticlval - TICL validation ntupler")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured analyses and merge histograms into the stores
    Run {
        /// Run config (YAML, or JSON when the extension is `.json`)
        #[arg(short, long)]
        config: PathBuf,

        /// Restrict to these analyses (repeatable). Defaults to all configured.
        #[arg(long = "analysis", value_enum)]
        analyses: Vec<Analysis>,

        /// Override `out_dir` from the config.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Report file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List collections, fields and event count of a Parquet source
    Inspect {
        /// Source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, analyses, out_dir, output } => {
            cmd_run(&config, &analyses, out_dir, output.as_ref())
        }
        Commands::Inspect { source, output } => cmd_inspect(&source, output.as_ref()),
    }
}

fn cmd_run(
    config: &Path,
    analyses: &[Analysis],
    out_dir: Option<PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    tracing::info!(path = %config.display(), "loading run config");
    let mut cfg = run::read_run_config(config)?;
    if let Some(dir) = out_dir {
        cfg.out_dir = dir;
    }
    let reports = run::run(&cfg, analyses)?;
    tracing::info!(stores = reports.len(), out_dir = %cfg.out_dir.display(), "run complete");
    write_json(output, serde_json::to_value(&reports)?)
}

fn cmd_inspect(source: &Path, output: Option<&PathBuf>) -> Result<()> {
    write_json(output, run::inspect(source)?)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
