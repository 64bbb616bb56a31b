//! Binance kline payload types

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::types::CandleSeries;

/// Binance kline/candlestick row
/// API returns an array: [open_time, open, high, low, close, volume, close_time,
///                        quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]
#[derive(Debug, Clone, PartialEq)]
pub struct BinanceKline {
    pub open_time: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub close_time: i64,
}

impl BinanceKline {
    /// Parse from raw JSON array returned by Binance API
    pub fn from_raw(raw: &[serde_json::Value]) -> Option<Self> {
        if raw.len() < 7 {
            return None;
        }

        Some(BinanceKline {
            open_time: raw[0].as_i64()?,
            high: raw[2].as_str()?.parse().ok()?,
            low: raw[3].as_str()?.parse().ok()?,
            close: raw[4].as_str()?.parse().ok()?,
            close_time: raw[6].as_i64()?,
        })
    }

    pub fn close_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.close_time)
    }
}

/// Parse a full klines response into a validated series
///
/// A single malformed row rejects the whole response, so a partially parsed
/// series never reaches the indicators.
pub fn parse_klines(rows: &[Vec<serde_json::Value>]) -> Result<CandleSeries, FetchError> {
    let mut closes = Vec::with_capacity(rows.len());
    let mut highs = Vec::with_capacity(rows.len());
    let mut lows = Vec::with_capacity(rows.len());
    let mut close_times = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let kline = BinanceKline::from_raw(row)
            .ok_or_else(|| FetchError::Payload(format!("row {} is not a kline", i)))?;
        let close_time = kline
            .close_datetime()
            .ok_or_else(|| FetchError::Payload(format!("row {} has an invalid close time", i)))?;

        closes.push(kline.close);
        highs.push(kline.high);
        lows.push(kline.low);
        close_times.push(close_time);
    }

    Ok(CandleSeries::new(closes, highs, lows, close_times)?)
}

/// Valid Binance intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}
