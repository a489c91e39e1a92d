use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::collector::InstrumentTarget;
use crate::market_data::adapters::{FetchError, QuoteSource};
use crate::market_data::extractor::{self, ExtractError};
use crate::persist::{LevelSink, PersistError};

/// How one cycle for one instrument ended. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Persisted(usize),
    FetchFailed,
    ExtractFailed,
    PersistFailed,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Persisted(_) => "persisted",
            CycleOutcome::FetchFailed => "fetch_failed",
            CycleOutcome::ExtractFailed => "extract_failed",
            CycleOutcome::PersistFailed => "persist_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Persisted(_))
    }
}

#[derive(Debug, Error)]
enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extract failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("persist failed: {0}")]
    Persist(#[from] PersistError),
}

impl CycleError {
    fn outcome(&self) -> CycleOutcome {
        match self {
            CycleError::Fetch(_) => CycleOutcome::FetchFailed,
            CycleError::Extract(_) => CycleOutcome::ExtractFailed,
            CycleError::Persist(_) => CycleOutcome::PersistFailed,
        }
    }
}

/// One fetch, at most one extraction, at most one write. Any failure ends
/// the cycle for this instrument only; it is logged here and never returned.
#[instrument(
    name = "cycle",
    skip_all,
    fields(instrument = %target.instrument_id, destination = %target.destination)
)]
pub async fn run_cycle(target: &InstrumentTarget, source: &dyn QuoteSource, sink: &dyn LevelSink) -> CycleOutcome {
    let outcome = match try_cycle(target, source, sink).await {
        Ok(written) => {
            info!(levels = written, "snapshot persisted");
            metrics::counter!("book_levels_persisted_total", "instrument" => target.instrument_id.clone())
                .increment(written as u64);
            CycleOutcome::Persisted(written)
        }
        Err(e) => {
            match &e {
                CycleError::Persist(_) => error!(error = %e, "cycle failed"),
                _ => warn!(error = %e, "cycle failed"),
            }
            e.outcome()
        }
    };

    metrics::counter!(
        "book_cycles_total",
        "instrument" => target.instrument_id.clone(),
        "outcome" => outcome.label()
    )
    .increment(1);
    outcome
}

async fn try_cycle(target: &InstrumentTarget, source: &dyn QuoteSource, sink: &dyn LevelSink) -> Result<usize, CycleError> {
    let raw = source.fetch(&target.instrument_id, target.depth).await?;
    let levels = extractor::extract(&raw, target.depth)?;
    drop(raw);
    Ok(sink.persist(&target.destination, levels).await?)
}
