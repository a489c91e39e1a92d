//! Periodically samples venue order book snapshots for a set of instruments
//! and stores the top levels of each side as time-series rows.

pub mod collector;
pub mod config;
pub mod market_data;
pub mod persist;
pub mod telemetry;
