//! Smoothed-RSI momentum indicator
//!
//! The calculator is a pure function of the close series:
//! 1. RSI over `rsi_period` closes (Wilder's smoothing)
//! 2. SMA over `smoothing_period` RSI values (the "smoothed momentum")
//! 3. slope = last smoothed value minus the one before it
//! 4. curve trend = share of rising/falling steps in the `curve_window`
//!    smoothed values preceding the latest one
//!
//! Any stage that runs short of data yields `None`, never a partial result.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use ta::indicators::SimpleMovingAverage;
use ta::Next;

use crate::config::IndicatorConfig;
use crate::types::{CandleSeries, CurveTrend, MacroTrend};

/// Output of one indicator pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    /// Latest smoothed RSI value
    pub smoothed_value: f64,
    pub slope: f64,
    pub curve_trend: CurveTrend,
    pub current_price: f64,
    /// Most recent slopes, newest first, `macro_lookback` long
    pub recent_slopes: Vec<f64>,
}

// =============================================================================
// Building Blocks
// =============================================================================

/// Calculate RSI using Wilder's smoothing
///
/// Returns only defined values: `values.len() - period` entries, the first
/// one seeded with the simple average of the first `period` gains/losses.
/// Uses the same recurrence as Wilder's ATR:
/// avg = (prev_avg * (period - 1) + current) / period
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return vec![];
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(changes.len() + 1 - period);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (period - 1) as f64 + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-change).max(0.0)) / period as f64;
        result.push(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// Calculate Simple Moving Average using ta crate
///
/// Returns only full-window values: `values.len() - period + 1` entries.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| (i, indicator.next(value)))
        .filter(|(i, _)| i + 1 >= period)
        .map(|(_, v)| v)
        .collect()
}

/// Classify the direction of a window by counting strict steps
pub fn curve_trend(window: &[f64], threshold: f64) -> CurveTrend {
    let (mut increasing, mut decreasing) = (0usize, 0usize);
    for (prev, next) in window.iter().tuple_windows() {
        if next > prev {
            increasing += 1;
        }
        if next < prev {
            decreasing += 1;
        }
    }

    let required = window.len().saturating_sub(1) as f64 * threshold;
    if window.len() < 2 {
        CurveTrend::Neutral
    } else if decreasing as f64 >= required {
        CurveTrend::Down
    } else if increasing as f64 >= required {
        CurveTrend::Up
    } else {
        CurveTrend::Neutral
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Run the full indicator pass over a candle series
pub fn calculate(series: &CandleSeries, config: &IndicatorConfig) -> Option<IndicatorResult> {
    let closes = &series.closes;
    if closes.len() < config.min_closes {
        return None;
    }

    let rsi_values = rsi(closes, config.rsi_period);
    if rsi_values.len() < config.smoothing_period {
        return None;
    }

    let smoothed = sma(&rsi_values, config.smoothing_period);
    let needed = config
        .min_smoothed
        .max(config.curve_window + 1)
        .max(config.macro_lookback + 1);
    if smoothed.len() < needed {
        return None;
    }

    let n = smoothed.len();
    let current = smoothed[n - 1];
    let slope = current - smoothed[n - 2];

    let window = &smoothed[n - 1 - config.curve_window..n - 1];
    let curve = curve_trend(window, config.curve_threshold);

    let recent_slopes = smoothed
        .iter()
        .rev()
        .tuple_windows()
        .map(|(newer, older)| newer - older)
        .take(config.macro_lookback)
        .collect();

    Some(IndicatorResult {
        smoothed_value: current,
        slope,
        curve_trend: curve,
        current_price: *closes.last()?,
        recent_slopes,
    })
}

/// Derive the macro trend from a higher-timeframe indicator pass
pub fn macro_trend(result: &IndicatorResult, lookback: usize) -> MacroTrend {
    let slopes = &result.recent_slopes;
    if lookback == 0 || slopes.len() < lookback {
        return MacroTrend::Neutral;
    }

    let window = &slopes[..lookback];
    if window.iter().all(|&s| s > 0.0) {
        MacroTrend::Bullish
    } else if window.iter().all(|&s| s < 0.0) {
        MacroTrend::Bearish
    } else {
        MacroTrend::Neutral
    }
}

// =============================================================================
// Tests
// =============================================================================
