//! Momentum Alerts
//!
//! Scans a fixed set of crypto instruments on a fixed cadence, classifies
//! each one by the slope and curvature of its smoothed RSI, and sends
//! deduplicated, cooldown-limited alerts when an instrument enters a terrain
//! confirmed by the higher timeframe. A market-wide gauge summarizes the
//! whole set and a consolidated alert fires when several instruments share
//! the same terrain.

pub mod admin;
pub mod alerts;
pub mod binance;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod consolidated;
pub mod error;
pub mod history;
pub mod indicators;
pub mod messages;
pub mod notifier;
pub mod report;
pub mod scanner;
pub mod schedule;
pub mod server;
pub mod state;
pub mod summary;
pub mod terrain;
pub mod types;

pub use config::Config;
pub use types::*;
