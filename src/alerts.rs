//! Per-instrument alert evaluation
//!
//! Each (instrument, timeframe) pair owns one [`InstrumentAlertState`]. An
//! individual alert fires only for a terrain classification that the
//! higher-timeframe trend confirms, at most once per candle and at most once
//! per cooldown window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::classifier::Classification;
use crate::indicators::IndicatorResult;
use crate::types::{Direction, InstrumentKey, MacroTrend};

/// Alert bookkeeping and last-seen readings for one instrument/timeframe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentAlertState {
    pub last_signal: Option<Direction>,
    pub last_candle_time: Option<DateTime<Utc>>,
    pub last_alert_time: Option<DateTime<Utc>>,
    /// Direction of the most recent confirmed terrain, fired or not
    pub last_entry_type: Option<Direction>,
    pub macro_status: String,
    pub current_label: String,
    pub current_emoji: String,
    pub current_price: f64,
    pub slope: f64,
}

/// Outcome of evaluating one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Classification is not a terrain
    NoTerrain,
    /// Terrain without a matching higher-timeframe trend
    NoMacroConfirmation(Direction),
    /// This candle was already evaluated
    SameCandle,
    /// An alert fired for this instrument less than a cooldown ago
    CoolingDown(Direction),
    Fire(Direction),
}

impl AlertDecision {
    pub fn fired(&self) -> Option<Direction> {
        match self {
            AlertDecision::Fire(direction) => Some(*direction),
            _ => None,
        }
    }
}

/// Dashboard text describing how the macro trend relates to the terrain
pub fn macro_status(terrain: Option<Direction>, trend: MacroTrend, macro_timeframe: &str) -> String {
    match terrain {
        Some(Direction::Long) if trend.confirms(Direction::Long) => {
            format!("MACRO confirmation ({}) 🚀", macro_timeframe)
        }
        Some(Direction::Short) if trend.confirms(Direction::Short) => {
            format!("MACRO confirmation ({}) 🔻", macro_timeframe)
        }
        Some(_) => format!("No MACRO confirmation ({}) ⚠️", macro_timeframe),
        None => String::new(),
    }
}

/// Owner of every instrument's alert state
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    cooldown: Duration,
    states: BTreeMap<String, InstrumentAlertState>,
}

impl AlertEvaluator {
    pub fn new(cooldown: Duration) -> Self {
        AlertEvaluator {
            cooldown,
            states: BTreeMap::new(),
        }
    }

    /// Refresh the informational fields shown on the dashboard
    pub fn observe(
        &mut self,
        key: &InstrumentKey,
        classification: &Classification,
        indicator: &IndicatorResult,
        macro_status: String,
    ) {
        let state = self.states.entry(key.to_string()).or_default();
        state.current_label = classification.label.clone();
        state.current_emoji = classification.emoji.clone();
        state.current_price = indicator.current_price;
        state.slope = indicator.slope;
        state.macro_status = macro_status;
    }

    /// Decide whether `terrain` fires an alert for the candle closing at `candle_time`
    pub fn evaluate(
        &mut self,
        key: &InstrumentKey,
        terrain: Option<Direction>,
        trend: MacroTrend,
        candle_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let Some(signal) = terrain else {
            return AlertDecision::NoTerrain;
        };

        if !trend.confirms(signal) {
            return AlertDecision::NoMacroConfirmation(signal);
        }

        let state = self.states.entry(key.to_string()).or_default();

        if state.last_candle_time == Some(candle_time) {
            debug!("{} candle {} already evaluated", key, candle_time);
            return AlertDecision::SameCandle;
        }

        if let Some(last_alert) = state.last_alert_time {
            if now - last_alert < self.cooldown {
                state.last_candle_time = Some(candle_time);
                state.last_entry_type = Some(signal);
                debug!("{} {} suppressed, last alert at {}", key, signal, last_alert);
                return AlertDecision::CoolingDown(signal);
            }
        }

        state.last_signal = Some(signal);
        state.last_candle_time = Some(candle_time);
        state.last_alert_time = Some(now);
        state.last_entry_type = Some(signal);
        AlertDecision::Fire(signal)
    }

    pub fn state(&self, key: &InstrumentKey) -> Option<&InstrumentAlertState> {
        self.states.get(&key.to_string())
    }

    pub fn states(&self) -> &BTreeMap<String, InstrumentAlertState> {
        &self.states
    }

    /// Seed a state directly, e.g. to restore bookkeeping
    pub fn insert_state(&mut self, key: &InstrumentKey, state: InstrumentAlertState) {
        self.states.insert(key.to_string(), state);
    }
}
