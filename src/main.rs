use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

/// yamlrt - parser, type checker, and evaluator for a declarative
/// YAML/JSON infrastructure program format.
#[derive(Parser)]
#[command(name = "yamlrt", version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and type-check a template, printing diagnostics only
    Check {
        /// Path to the template file (.yaml or .json)
        file: PathBuf,
    },

    /// Evaluate a template against an in-memory orchestrator in preview
    /// mode: unresolved config is unknown rather than an error, and no
    /// resource is actually registered.
    Preview {
        file: PathBuf,

        /// Config values as `key=value`, passed to the in-memory config source
        #[arg(short, long)]
        config: Vec<String>,
    },

    /// Evaluate a template against an in-memory orchestrator and print its
    /// exports.
    Up {
        file: PathBuf,

        #[arg(short, long)]
        config: Vec<String>,
    },
}

fn parse_config_flags(flags: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    flags
        .iter()
        .map(|kv| {
            kv.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("--config expects `key=value`, got `{}`", kv))
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "yamlrt=debug,info" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter)).init();

    let result = run(cli).await;
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Check { file } => self::cli::check(&file).await,
        Commands::Preview { file, config } => {
            let config = parse_config_flags(&config)?;
            self::cli::run(&file, true, config).await
        }
        Commands::Up { file, config } => {
            let config = parse_config_flags(&config)?;
            self::cli::run(&file, false, config).await
        }
    }
}
