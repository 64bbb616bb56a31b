//! Market state classification from slope and curve trend
//!
//! Thresholds are evaluated in order and the first match wins. Weights are
//! negative for bullish states and positive for bearish ones; they only feed
//! the market summary gauge.

use serde::{Deserialize, Serialize};

use crate::types::{CurveTrend, Direction};

/// Slope magnitude above which a move is considered euphoric
pub const EUPHORIA_SLOPE: f64 = 1.0;

/// Slope magnitude at or below which the market is considered calm
pub const CALM_SLOPE: f64 = 0.10;

/// Qualitative market state of one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    LongEuphoria,
    LongInProgress,
    ShortEuphoria,
    ShortInProgress,
    LongTerrain,
    ShortTerrain,
    Indecision,
}

impl MarketState {
    pub fn label(&self) -> &'static str {
        match self {
            MarketState::LongEuphoria => "LONG euphoria",
            MarketState::LongInProgress => "LONG in progress",
            MarketState::ShortEuphoria => "SHORT euphoria",
            MarketState::ShortInProgress => "SHORT in progress",
            MarketState::LongTerrain => "LONG terrain",
            MarketState::ShortTerrain => "SHORT terrain",
            MarketState::Indecision => "Indecision",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MarketState::LongEuphoria => "🚀",
            MarketState::LongInProgress => "🟢",
            MarketState::ShortEuphoria => "🩸",
            MarketState::ShortInProgress => "🔴",
            MarketState::LongTerrain => "🍏",
            MarketState::ShortTerrain => "🍎",
            MarketState::Indecision => "🦀",
        }
    }

    pub fn weight(&self) -> i32 {
        match self {
            MarketState::LongEuphoria => -10,
            MarketState::LongInProgress => -5,
            MarketState::ShortEuphoria => 10,
            MarketState::ShortInProgress => 5,
            MarketState::LongTerrain | MarketState::ShortTerrain | MarketState::Indecision => 0,
        }
    }

    pub fn terrain(&self) -> Option<Direction> {
        match self {
            MarketState::LongTerrain => Some(Direction::Long),
            MarketState::ShortTerrain => Some(Direction::Short),
            _ => None,
        }
    }
}

/// Result of classifying one instrument for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub state: MarketState,
    pub label: String,
    pub emoji: String,
    pub weight: i32,
    pub terrain: Option<Direction>,
}

impl From<MarketState> for Classification {
    fn from(state: MarketState) -> Self {
        Classification {
            state,
            label: state.label().to_string(),
            emoji: state.emoji().to_string(),
            weight: state.weight(),
            terrain: state.terrain(),
        }
    }
}

/// Map slope and curve trend to a market state
pub fn market_state(slope: f64, curve: CurveTrend) -> MarketState {
    if slope > EUPHORIA_SLOPE {
        MarketState::LongEuphoria
    } else if slope > CALM_SLOPE {
        MarketState::LongInProgress
    } else if slope < -EUPHORIA_SLOPE {
        MarketState::ShortEuphoria
    } else if slope < -CALM_SLOPE {
        MarketState::ShortInProgress
    } else {
        match curve {
            CurveTrend::Down => MarketState::LongTerrain,
            CurveTrend::Up => MarketState::ShortTerrain,
            CurveTrend::Neutral => MarketState::Indecision,
        }
    }
}

/// Classify slope and curve trend into a full classification
pub fn classify(slope: f64, curve: CurveTrend) -> Classification {
    market_state(slope, curve).into()
}
