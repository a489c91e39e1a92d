// Collector: the fetch -> extract -> persist cycle and the loop that drives it
pub mod scheduler; // timer, fan-out and shutdown
pub mod task;      // one cycle for one instrument

use thiserror::Error;

use crate::market_data::adapters::okx::MAX_BOOK_DEPTH;
use crate::persist::{Destination, InvalidDestination};

pub use scheduler::{Scheduler, SchedulerReport, ShutdownPolicy};
pub use task::{run_cycle, CycleOutcome};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("instrument id must not be empty")]
    EmptyInstrument,
    #[error("depth {0} is outside 1..={max}", max = MAX_BOOK_DEPTH)]
    Depth(usize),
    #[error(transparent)]
    Destination(#[from] InvalidDestination),
}

/// One instrument to sample: where to fetch it, where its levels go, how deep.
/// Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentTarget {
    pub instrument_id: String,
    pub destination: Destination,
    pub depth: usize,
}

impl InstrumentTarget {
    pub fn new(instrument_id: &str, destination: &str, depth: usize) -> Result<Self, TargetError> {
        let instrument_id = instrument_id.trim();
        if instrument_id.is_empty() {
            return Err(TargetError::EmptyInstrument);
        }
        if !(1..=MAX_BOOK_DEPTH).contains(&depth) {
            return Err(TargetError::Depth(depth));
        }
        Ok(Self {
            instrument_id: instrument_id.to_string(),
            destination: Destination::parse(destination)?,
            depth,
        })
    }
}
