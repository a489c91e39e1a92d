#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;

use book_recorder::collector::InstrumentTarget;
use book_recorder::market_data::adapters::okx::decode_books;
use book_recorder::market_data::adapters::{FetchError, QuoteSource};
use book_recorder::market_data::types::{PriceLevel, RawSnapshot};
use book_recorder::persist::{Destination, LevelSink, PersistError, PersistResult};

pub fn entries(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
}

/// The book from the documented example: one malformed ask.
pub fn sample_book() -> RawSnapshot {
    RawSnapshot {
        bids: entries(&[&["100.5", "2"], &["100.4", "1"]]),
        asks: entries(&[&["100.6", "3"], &["bad", "1"]]),
        ts: "1700000000000".into(),
    }
}

pub fn target(instrument: &str, destination: &str) -> InstrumentTarget {
    InstrumentTarget::new(instrument, destination, 2).unwrap()
}

#[derive(Clone)]
pub enum Behavior {
    Book(RawSnapshot),
    /// Venue answers HTTP 500.
    ServerError,
    /// Timestamp can't be parsed.
    BadTimestamp,
    Panic,
}

/// `QuoteSource` that answers from a per-instrument script and counts calls.
#[derive(Default)]
pub struct ScriptedSource {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, instrument: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(instrument.to_string(), behavior);
        self
    }

    pub fn calls(&self, instrument: &str) -> usize {
        self.calls.lock().get(instrument).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch(&self, instrument_id: &str, _depth: usize) -> Result<RawSnapshot, FetchError> {
        *self.calls.lock().entry(instrument_id.to_string()).or_default() += 1;
        match self.behaviors.get(instrument_id).cloned().unwrap_or(Behavior::Book(sample_book())) {
            Behavior::Book(book) => Ok(book),
            Behavior::ServerError => decode_books(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
            Behavior::BadTimestamp => Ok(RawSnapshot { ts: "yesterday".into(), ..sample_book() }),
            Behavior::Panic => panic!("scripted panic for {instrument_id}"),
        }
    }
}

/// `LevelSink` that remembers every batch it was handed.
#[derive(Default)]
pub struct RecordingSink {
    delay: Duration,
    failing: HashSet<String>,
    writes: Mutex<Vec<(Destination, Vec<PriceLevel>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write sleeps this long before it is recorded.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_for(mut self, destination: &str) -> Self {
        self.failing.insert(destination.to_string());
        self
    }

    pub fn writes_to(&self, destination: &str) -> usize {
        self.writes.lock().iter().filter(|(d, _)| d.as_str() == destination).count()
    }

    pub fn total_writes(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn batches(&self) -> Vec<(Destination, Vec<PriceLevel>)> {
        self.writes.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LevelSink for RecordingSink {
    async fn ensure_destination(&self, _destination: &Destination) -> PersistResult<()> {
        Ok(())
    }

    async fn persist(&self, destination: &Destination, levels: Vec<PriceLevel>) -> PersistResult<usize> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(destination.as_str()) {
            return Err(PersistError::WriteFailed {
                destination: destination.to_string(),
                source: "disk full".into(),
            });
        }

        let written = levels.len();
        self.writes.lock().push((destination.clone(), levels));
        Ok(written)
    }
}
