//! Candle data sources
//! No API key needed for public market data endpoints.

mod client;
mod types;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::CandleSeries;

pub use client::BinanceClient;
pub use types::*;

/// Anything that can return the most recent candles of an instrument
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` candles, most recent last
    async fn fetch(
        &self,
        instrument: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError>;
}
