// Shared trait + error for order book snapshot sources

use thiserror::Error;

use crate::market_data::types::RawSnapshot;

#[derive(Debug, Error)]
pub enum FetchError {
    /// No response, or a non-success status. `status` is `None` when the
    /// request never got one (connect failure, timeout, truncated body).
    #[error("request failed (status {status:?}): {body}")]
    TransportOrApi { status: Option<u16>, body: String },
    /// Success status but the body could not be decoded.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    /// The venue answered with an application-level error code.
    #[error("venue error {code}: {msg}")]
    Api { code: String, msg: String },
    #[error("venue returned no order book data")]
    NoData,
}

/// One request-response round trip per call, no retries.
/// Implementations must be safe to call concurrently for different instruments.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, instrument_id: &str, depth: usize) -> Result<RawSnapshot, FetchError>;
}

pub mod okx;
pub mod okx_types;
