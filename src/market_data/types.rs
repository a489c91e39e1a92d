use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// One raw `[price, size, ...]` entry exactly as the venue sent it.
pub type RawEntry = Vec<String>;

/// Venue response for one instrument at one instant.
/// Both sides arrive best-first; nothing downstream re-sorts them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSnapshot {
    pub bids: Vec<RawEntry>,
    pub asks: Vec<RawEntry>,
    /// Millisecond epoch as a decimal string, e.g. "1700000000000".
    pub ts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown side {0:?}")]
pub struct UnknownSide(pub String);

impl FromStr for Side {
    type Err = UnknownSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bid" => Ok(Side::Bid),
            "ask" => Ok(Side::Ask),
            other => Err(UnknownSide(other.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated level ready to be handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    /// Shared by every level of the snapshot it came from.
    pub snapshot_ts: DateTime<Utc>,
    pub side: Side,
    /// 1-based position in the venue's array, skipped slots included.
    pub rank: u32,
    pub price: Decimal,
    pub size: Decimal,
}
