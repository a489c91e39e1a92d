//! Pure conversions between extracted levels and storable rows.
//!
//! This file MUST NOT talk to the database. Only struct <-> struct mapping lives here.

use chrono::{DateTime, Utc};

use crate::market_data::types::PriceLevel;
use crate::persist::types::LevelRow;

/// Stamp a whole batch with a single `persisted_at`.
pub fn to_rows(levels: Vec<PriceLevel>, persisted_at: DateTime<Utc>) -> Vec<LevelRow> {
    levels
        .into_iter()
        .map(|level| LevelRow {
            snapshot_timestamp: level.snapshot_ts,
            side: level.side,
            rank: level.rank as i32,
            price: level.price,
            size: level.size,
            persisted_at,
        })
        .collect()
}
