//! On-demand evaluation of a single instrument
//!
//! Runs the same indicator, classification and macro-confirmation path as
//! the scan loop, outside its cadence. Nothing here touches cooldowns,
//! terrain tracking or history.

use serde::Serialize;
use std::fmt;
use tokio::time::sleep;
use tracing::warn;

use crate::alerts::macro_status;
use crate::binance::CandleSource;
use crate::classifier::classify;
use crate::config::Config;
use crate::error::FetchError;
use crate::indicators;
use crate::scanner::fetch_macro_trend;
use crate::types::{CurveTrend, Direction, MacroTrend};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentReport {
    pub instrument: String,
    pub timeframe: String,
    pub current_price: f64,
    pub smoothed_value: f64,
    pub slope: f64,
    pub curve_trend: CurveTrend,
    pub state_label: String,
    pub state_emoji: String,
    pub weight: i32,
    pub terrain: Option<Direction>,
    pub macro_trend: MacroTrend,
    pub macro_status: String,
}

impl InstrumentReport {
    /// Terrain confirmed by the macro trend, i.e. alert-eligible
    pub fn confirmed_terrain(&self) -> Option<Direction> {
        self.terrain.filter(|d| self.macro_trend.confirms(*d))
    }
}

impl fmt::Display for InstrumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "💎 {} ({})", self.instrument, self.timeframe)?;
        writeln!(f, "💰 Price: ${}", self.current_price)?;
        writeln!(f, "📸 State: {} {}", self.state_label, self.state_emoji)?;
        writeln!(
            f,
            "📐 Slope: {:.4} | Smoothed RSI: {:.2} | Curve: {:?}",
            self.slope, self.smoothed_value, self.curve_trend
        )?;
        write!(f, "🪐 Macro: {:?}", self.macro_trend)?;
        if !self.macro_status.is_empty() {
            write!(f, " ({})", self.macro_status)?;
        }
        Ok(())
    }
}

/// Result of evaluating one instrument on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Ready(InstrumentReport),
    InsufficientData { instrument: String, timeframe: String },
}

/// Evaluate `instrument` on `timeframe`
pub async fn evaluate_instrument(
    source: &dyn CandleSource,
    config: &Config,
    instrument: &str,
    timeframe: &str,
) -> Result<ReportOutcome, FetchError> {
    let series = source
        .fetch(instrument, timeframe, config.scan.fetch_limit)
        .await?;

    let Some(indicator) = indicators::calculate(&series, &config.indicator) else {
        return Ok(ReportOutcome::InsufficientData {
            instrument: instrument.to_string(),
            timeframe: timeframe.to_string(),
        });
    };

    let classification = classify(indicator.slope, indicator.curve_trend);

    sleep(config.scan.request_delay()).await;
    let macro_trend = fetch_macro_trend(source, config, instrument).await;

    Ok(ReportOutcome::Ready(InstrumentReport {
        instrument: instrument.to_string(),
        timeframe: timeframe.to_string(),
        current_price: indicator.current_price,
        smoothed_value: indicator.smoothed_value,
        slope: indicator.slope,
        curve_trend: indicator.curve_trend,
        macro_status: macro_status(
            classification.terrain,
            macro_trend,
            &config.scan.macro_timeframe,
        ),
        state_label: classification.label,
        state_emoji: classification.emoji,
        weight: classification.weight,
        terrain: classification.terrain,
        macro_trend,
    }))
}

/// Evaluate every configured pair sequentially, honoring the request delay
///
/// Failed pairs are logged and left out.
pub async fn evaluate_all(source: &dyn CandleSource, config: &Config) -> Vec<ReportOutcome> {
    let mut outcomes = Vec::new();
    for key in config.scan.keys() {
        sleep(config.scan.request_delay()).await;
        match evaluate_instrument(source, config, &key.instrument, &key.timeframe).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("{}: report failed: {}", key, e),
        }
    }
    outcomes
}
