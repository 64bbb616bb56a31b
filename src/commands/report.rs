//! One-shot manual evaluation printed to stdout

use anyhow::{Context, Result};
use tracing::info;

use momentum_alerts::binance::BinanceClient;
use momentum_alerts::report::{self, ReportOutcome};

pub fn run(
    config_path: Option<String>,
    symbol: Option<String>,
    all: bool,
    timeframe: Option<String>,
) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, symbol, all, timeframe))
}

fn print_outcome(outcome: &ReportOutcome, category: Option<&str>) {
    if let Some(category) = category {
        println!("[{}]", category);
    }
    match outcome {
        ReportOutcome::Ready(report) => {
            println!("{}", report);
            if let Some(direction) = report.confirmed_terrain() {
                println!("✅ {} terrain confirmed, alert-eligible", direction);
            }
        }
        ReportOutcome::InsufficientData {
            instrument,
            timeframe,
        } => println!("⚠️ {} ({}): not enough candles", instrument, timeframe),
    }
    println!();
}

async fn run_async(
    config_path: Option<String>,
    symbol: Option<String>,
    all: bool,
    timeframe: Option<String>,
) -> Result<()> {
    let config = super::load_config(config_path.as_deref())?;
    let source = BinanceClient::new(&config.scan.futures_only)?;

    if all {
        info!("Evaluating {} configured pairs", config.scan.keys().len());
        for outcome in report::evaluate_all(&source, &config).await {
            let instrument = match &outcome {
                ReportOutcome::Ready(report) => &report.instrument,
                ReportOutcome::InsufficientData { instrument, .. } => instrument,
            };
            print_outcome(&outcome, config.scan.category_of(instrument));
        }
        return Ok(());
    }

    let symbol = symbol
        .context("Pass a SYMBOL or --all")?
        .to_uppercase();
    let timeframe = timeframe
        .or_else(|| config.scan.timeframes.first().cloned())
        .context("No timeframe configured")?;

    let outcome = report::evaluate_instrument(&source, &config, &symbol, &timeframe)
        .await
        .with_context(|| format!("Failed to evaluate {} {}", symbol, timeframe))?;
    print_outcome(&outcome, config.scan.category_of(&symbol));
    Ok(())
}
