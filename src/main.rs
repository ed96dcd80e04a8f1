mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

use secret_splitter::config::Config;
use secret_splitter::logging::{self, LogFormat};

#[derive(Parser)]
#[command(name = "secret-splitter")]
#[command(about = "Split secrets with Shamir's Secret Sharing, compatible with ssss", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "SECRET_SPLITTER_CONFIG")]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Format of log output
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the default threshold, share count and modes
    Init,

    /// Split a secret (or an encrypted file's key) into shares
    Split(commands::SplitArgs),

    /// Combine shares to recover a secret (or decrypt a file)
    Combine(commands::CombineArgs),
}

fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    // Everything except init needs the configuration and logging
    let setup = || -> Result<Config> {
        let config = Config::load_from(&config_path).context("Failed to load configuration")?;
        let level = if cli.verbose { "debug" } else { "warn" };
        logging::init_logging(level, cli.log_format.unwrap_or(config.log_format));
        Ok(config)
    };

    match cli.command {
        Commands::Init => commands::init(&config_path),
        Commands::Split(args) => commands::split(&setup()?, args),
        Commands::Combine(args) => commands::combine(&setup()?, args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", style("FATAL:").red().bold(), err);
        std::process::exit(1);
    }
}
