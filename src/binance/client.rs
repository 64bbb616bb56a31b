//! Binance market data client
//!
//! No API key required for public market data endpoints. Spot klines come
//! from the public data mirror; symbols listed as futures-only go straight to
//! the USD-M futures API, and any other symbol falls back to it when the spot
//! request fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use super::types::parse_klines;
use super::CandleSource;
use crate::error::FetchError;
use crate::types::CandleSeries;

/// Public spot market data mirror
const SPOT_API_BASE: &str = "https://data-api.binance.vision/api/v3";

/// USD-M futures market data
const FUTURES_API_BASE: &str = "https://fapi.binance.com/fapi/v1";

/// Maximum klines per request (Binance limit)
const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Binance API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    futures_only: HashSet<String>,
}

impl BinanceClient {
    /// Create a new Binance client
    pub fn new(futures_only: &[String]) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(BinanceClient {
            client,
            futures_only: futures_only.iter().cloned().collect(),
        })
    }

    pub fn is_futures_only(&self, symbol: &str) -> bool {
        self.futures_only.contains(symbol)
    }

    async fn get_klines(
        &self,
        base: &str,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        let url = format!("{}/klines", base);
        let limit = limit.min(MAX_KLINES_PER_REQUEST);
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];

        debug!(
            "Fetching klines: url={}, symbol={}, interval={}, limit={}",
            url, symbol, interval, limit
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| FetchError::Payload(e.to_string()))?;

        if rows.is_empty() {
            return Err(FetchError::NoData {
                instrument: symbol.to_string(),
                timeframe: interval.to_string(),
            });
        }

        parse_klines(&rows)
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch(
        &self,
        instrument: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        if self.is_futures_only(instrument) {
            return self
                .get_klines(FUTURES_API_BASE, instrument, timeframe, limit)
                .await;
        }

        match self
            .get_klines(SPOT_API_BASE, instrument, timeframe, limit)
            .await
        {
            Ok(series) => Ok(series),
            Err(spot_err) => {
                warn!(
                    "Spot klines for {} {} failed ({}), trying futures",
                    instrument, timeframe, spot_err
                );
                self.get_klines(FUTURES_API_BASE, instrument, timeframe, limit)
                    .await
            }
        }
    }
}
