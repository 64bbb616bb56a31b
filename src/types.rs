//! Core data types used across the scanner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for a fetched candle series
#[derive(Debug, Error, PartialEq)]
pub enum SeriesValidationError {
    #[error("series columns differ in length: closes={closes}, highs={highs}, lows={lows}, close_times={close_times}")]
    LengthMismatch {
        closes: usize,
        highs: usize,
        lows: usize,
        close_times: usize,
    },

    #[error("series is empty")]
    Empty,
}

/// Trade direction of a terrain or an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Both directions in evaluation order (LONG wins ties)
    pub const ALL: [Direction; 2] = [Direction::Long, Direction::Short];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// The macro trend an alert in this direction must agree with
    pub fn required_macro(&self) -> MacroTrend {
        match self {
            Direction::Long => MacroTrend::Bullish,
            Direction::Short => MacroTrend::Bearish,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Qualitative direction of the smoothed momentum over the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurveTrend {
    Up,
    Down,
    #[default]
    Neutral,
}

/// Higher-timeframe slope trend used to confirm individual alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroTrend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl MacroTrend {
    /// Whether this trend confirms a terrain in `direction`
    pub fn confirms(&self, direction: Direction) -> bool {
        *self == direction.required_macro()
    }
}

/// Identifies one scanned (instrument, timeframe) pair
///
/// Rendered as `"<instrument>_<timeframe>"`, which is the key used by the
/// alert-state map and the read API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub instrument: String,
    pub timeframe: String,
}

impl InstrumentKey {
    pub fn new(instrument: impl Into<String>, timeframe: impl Into<String>) -> Self {
        InstrumentKey {
            instrument: instrument.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl std::fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.instrument, self.timeframe)
    }
}

/// Close/high/low columns of fetched candles, most recent last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub close_times: Vec<DateTime<Utc>>,
}

impl CandleSeries {
    /// Build a series, rejecting ragged or empty columns
    pub fn new(
        closes: Vec<f64>,
        highs: Vec<f64>,
        lows: Vec<f64>,
        close_times: Vec<DateTime<Utc>>,
    ) -> Result<Self, SeriesValidationError> {
        let n = closes.len();
        if highs.len() != n || lows.len() != n || close_times.len() != n {
            return Err(SeriesValidationError::LengthMismatch {
                closes: n,
                highs: highs.len(),
                lows: lows.len(),
                close_times: close_times.len(),
            });
        }
        if n == 0 {
            return Err(SeriesValidationError::Empty);
        }

        Ok(CandleSeries {
            closes,
            highs,
            lows,
            close_times,
        })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Close time of the most recent candle
    pub fn last_close_time(&self) -> Option<DateTime<Utc>> {
        self.close_times.last().copied()
    }
}
