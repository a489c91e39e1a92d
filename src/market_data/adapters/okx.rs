// OKX REST adapter: GET /api/v5/market/books

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::okx_types::BooksResponse;
use super::{FetchError, QuoteSource};
use crate::config::ProviderConfig;
use crate::market_data::types::RawSnapshot;

pub const DEFAULT_BASE_URL: &str = "https://www.okx.com";
pub const BOOKS_ENDPOINT: &str = "/api/v5/market/books";
/// Largest `sz` the books endpoint accepts.
pub const MAX_BOOK_DEPTH: usize = 400;

// Keeps error diagnostics readable when the venue returns an HTML error page.
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct OkxClient {
    http: reqwest::Client,
    books_url: String,
}

impl OkxClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("book-recorder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            books_url: format!("{}{}", config.base_url.trim_end_matches('/'), BOOKS_ENDPOINT),
        })
    }
}

#[async_trait::async_trait]
impl QuoteSource for OkxClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, instrument_id: &str, depth: usize) -> Result<RawSnapshot, FetchError> {
        let started = Instant::now();
        let depth_param = depth.to_string();
        let response = self
            .http
            .get(&self.books_url)
            .query(&[("instId", instrument_id), ("sz", depth_param.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        metrics::histogram!("book_fetch_seconds", "instrument" => instrument_id.to_string())
            .record(started.elapsed().as_secs_f64());
        debug!(%status, bytes = body.len(), "books response received");

        decode_books(status, &body)
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    FetchError::TransportOrApi { status: e.status().map(|s| s.as_u16()), body: e.to_string() }
}

/// Map a books response onto a snapshot or a typed fetch error.
pub fn decode_books(status: StatusCode, body: &str) -> Result<RawSnapshot, FetchError> {
    if !status.is_success() {
        return Err(FetchError::TransportOrApi {
            status: Some(status.as_u16()),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    let response: BooksResponse =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedBody(e.to_string()))?;

    if response.code != "0" {
        return Err(FetchError::Api { code: response.code, msg: response.msg });
    }

    response.data.into_iter().next().map(RawSnapshot::from).ok_or(FetchError::NoData)
}
