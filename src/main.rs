//! Momentum alerts - main entry point
//!
//! This binary provides two subcommands:
//! - run: Run the scan loop with the JSON API
//! - report: Evaluate one instrument (or all) on demand

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "momentum-alerts")]
#[command(about = "Smoothed-RSI market state scanner with Telegram alerts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scan loop and JSON API
    Run {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Evaluate an instrument on demand without touching alert state
    Report {
        /// Instrument to evaluate, e.g. BTCUSDT
        symbol: Option<String>,

        /// Evaluate every configured pair
        #[arg(long, conflicts_with = "symbol")]
        all: bool,

        /// Timeframe (defaults to the first configured one)
        #[arg(short, long)]
        timeframe: Option<String>,

        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Report { .. } => "report",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Run { config, dry_run } => commands::run::run(config, dry_run),
        Commands::Report {
            symbol,
            all,
            timeframe,
            config,
        } => commands::report::run(config, symbol, all, timeframe),
    }
}
