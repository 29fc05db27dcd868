mod cmd_analyze;
mod cmd_audit;
mod cmd_precheck;
mod cmd_providers;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccm", version, about = "Cookie-consent compliance auditor")]
struct Cli {
    /// YAML config file (default: ./ccm.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for audit results and event logs (overrides `output_dir`)
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that URLs answer before auditing them
    Precheck {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the consent flow against a recorded site
    Audit {
        /// Site fixture (YAML or JSON)
        #[arg(long)]
        fixture: PathBuf,
        /// URL to audit (default: the fixture's url)
        #[arg(long)]
        url: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report compliance flags for a saved result
    Analyze {
        /// Path to a result.json
        result: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered consent platforms and analytics providers
    Providers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("CCM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;
    let cfg = config::CliConfig::load(cli.config.as_deref(), &cwd)?;
    let out_dir = cli.out.unwrap_or_else(|| cfg.output_dir.clone());

    match cli.cmd {
        Command::Precheck { urls, json } => cmd_precheck::execute(&urls, json),
        Command::Audit { fixture, url, json } => {
            cmd_audit::execute(&cfg, &out_dir, &fixture, url.as_deref(), json)
        }
        Command::Analyze { result, json } => cmd_analyze::execute(&result, json),
        Command::Providers { json } => cmd_providers::execute(&cfg, json),
    }
}
