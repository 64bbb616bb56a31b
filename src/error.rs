//! Error types for the scanner's external boundaries
//!
//! Insufficient indicator data is not an error: the calculator returns
//! `None` and the instrument is skipped for the tick.

use thiserror::Error;

use crate::types::SeriesValidationError;

/// Transient candle-fetch failures. The instrument is skipped for one tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed kline payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Series(#[from] SeriesValidationError),

    #[error("no candles for {instrument} {timeframe}")]
    NoData {
        instrument: String,
        timeframe: String,
    },
}

/// Delivery failure for a single recipient
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram rejected message for {chat_id}: {description}")]
    Rejected { chat_id: String, description: String },
}

/// Rejections of admin-facing actions. No state is mutated when returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("signal {0} not found")]
    SignalNotFound(u64),

    #[error("scan loop is not running")]
    LoopUnavailable,
}
