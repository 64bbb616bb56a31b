//! Scan loop command
//!
//! Runs the scanner until Ctrl+C, with the JSON API alongside it.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use momentum_alerts::admin::AdminHandle;
use momentum_alerts::binance::{is_valid_interval, BinanceClient, CandleSource};
use momentum_alerts::clock::{Clock, SystemClock};
use momentum_alerts::notifier::{LogNotifier, Notifier, TelegramNotifier};
use momentum_alerts::scanner::Scanner;
use momentum_alerts::server::{self, AppState};
use momentum_alerts::state::{shared_snapshot, Snapshot};
use momentum_alerts::Config;

pub fn run(config_path: Option<String>, dry_run: bool) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, dry_run))
}

fn build_notifier(config: &Config, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        info!("Dry run: alerts are logged, not sent");
        return Ok(Arc::new(LogNotifier));
    }
    if config.telegram.token.is_none() {
        warn!("TELEGRAM_TOKEN not set, alerts are logged only");
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(TelegramNotifier::new(config.telegram.clone())?))
}

async fn run_async(config_path: Option<String>, dry_run: bool) -> Result<()> {
    let config = super::load_config(config_path.as_deref())?;

    for timeframe in config
        .scan
        .timeframes
        .iter()
        .chain(std::iter::once(&config.scan.macro_timeframe))
    {
        if !is_valid_interval(timeframe) {
            anyhow::bail!("Unsupported timeframe {}", timeframe);
        }
    }

    info!("Momentum alerts starting");
    info!("Pairs: {}", config.scan.symbols.join(", "));
    info!(
        "Timeframes: {} (macro {})",
        config.scan.timeframes.join(", "),
        config.scan.macro_timeframe
    );
    info!("Check interval: {} seconds", config.scan.check_interval_secs);

    let source: Arc<dyn CandleSource> = Arc::new(BinanceClient::new(&config.scan.futures_only)?);
    let notifier = build_notifier(&config, dry_run)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let active = Arc::new(AtomicBool::new(config.admin.start_active));
    if !config.admin.start_active {
        info!("System starts disabled, waiting for admin activation");
    }

    let snapshot = shared_snapshot(Snapshot::default());
    let (command_tx, command_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    let admin = AdminHandle::new(
        config.admin.password.clone(),
        active.clone(),
        command_tx,
        notifier.clone(),
        clock.clone(),
        config.schedule.tz()?,
    );

    let scanner = Scanner::new(
        config.clone(),
        source.clone(),
        notifier,
        clock,
        active,
        snapshot.clone(),
    )?;

    if config.server.enabled {
        let state = Arc::new(AppState {
            config: Arc::new(config.clone()),
            snapshot,
            admin,
            source,
        });
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = server::serve(state, port).await {
                error!("JSON API stopped: {}", e);
            }
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    scanner.run(command_rx, shutdown_rx).await;
    info!("Momentum alerts stopped.");
    Ok(())
}
