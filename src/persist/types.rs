use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::market_data::types::Side;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("batch write to {destination} failed: {source}")]
    WriteFailed {
        destination: String,
        #[source]
        source: BoxError,
    },
    #[error("schema setup for {destination} failed: {source}")]
    Schema {
        destination: String,
        #[source]
        source: BoxError,
    },
    #[error("query against {destination} failed: {source}")]
    Query {
        destination: String,
        #[source]
        source: BoxError,
    },
    #[error("storage connection failed: {0}")]
    Connect(#[source] BoxError),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Postgres truncates identifiers past this length.
const MAX_IDENTIFIER_LEN: usize = 63;
const INDEX_SUFFIX: &str = "_snapshot_ts_idx";

/// Longest destination whose derived index name still fits an identifier.
pub const MAX_DESTINATION_LEN: usize = MAX_IDENTIFIER_LEN - INDEX_SUFFIX.len();

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid destination {name:?}: {reason}")]
pub struct InvalidDestination {
    pub name: String,
    pub reason: &'static str,
}

/// Name of the table a batch of levels lands in.
///
/// Restricted to plain SQL identifiers because it is interpolated (quoted)
/// into DDL and INSERT statements rather than bound as a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Destination(String);

impl Destination {
    pub fn parse(name: &str) -> Result<Self, InvalidDestination> {
        let reject = |reason| Err(InvalidDestination { name: name.to_string(), reason });

        let mut chars = name.chars();
        match chars.next() {
            None => return reject("empty"),
            Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                return reject("must start with a letter or underscore")
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return reject("only ASCII letters, digits and underscores are allowed");
        }
        if name.len() > MAX_DESTINATION_LEN {
            return reject("longer than 47 characters");
        }
        Ok(Destination(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Quoted name of the `snapshot_timestamp` index on this table.
    pub fn index_quoted(&self) -> String {
        format!("\"{}{}\"", self.0, INDEX_SUFFIX)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored row: a `PriceLevel` plus the moment the sink wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRow {
    pub snapshot_timestamp: DateTime<Utc>,
    pub side: Side,
    pub rank: i32,
    pub price: Decimal,
    pub size: Decimal,
    pub persisted_at: DateTime<Utc>,
}
