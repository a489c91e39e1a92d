//! Turns a `RawSnapshot` into a bounded, validated list of `PriceLevel`s.
//!
//! Pure apart from diagnostics: the same snapshot always yields the same levels.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::market_data::normaliser::parse_entry;
use crate::market_data::types::{PriceLevel, RawEntry, RawSnapshot, Side};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("bad snapshot timestamp {raw:?}: {reason}")]
    BadTimestamp { raw: String, reason: String },
    #[error("no valid levels within depth {depth}")]
    NoValidLevels { depth: usize },
}

/// Parse the venue's millisecond epoch string into a UTC instant.
pub fn parse_snapshot_ts(raw: &str) -> Result<DateTime<Utc>, ExtractError> {
    let millis: i64 = raw.parse().map_err(|e: std::num::ParseIntError| ExtractError::BadTimestamp {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| ExtractError::BadTimestamp {
        raw: raw.to_string(),
        reason: "out of range".to_string(),
    })
}

/// Keep at most `depth` levels per side.
///
/// Malformed entries are skipped one at a time. Ranks are the entry's
/// position in the venue array (1-based), so a skipped entry leaves a gap
/// rather than promoting the levels behind it.
pub fn extract(raw: &RawSnapshot, depth: usize) -> Result<Vec<PriceLevel>, ExtractError> {
    let snapshot_ts = parse_snapshot_ts(&raw.ts)?;

    let mut levels = Vec::with_capacity(raw.bids.len().min(depth) + raw.asks.len().min(depth));
    extract_side(&mut levels, Side::Bid, &raw.bids, depth, snapshot_ts);
    extract_side(&mut levels, Side::Ask, &raw.asks, depth, snapshot_ts);

    if levels.is_empty() {
        return Err(ExtractError::NoValidLevels { depth });
    }

    debug!(levels = levels.len(), depth, "extracted order book levels");
    Ok(levels)
}

fn extract_side(
    out: &mut Vec<PriceLevel>,
    side: Side,
    entries: &[RawEntry],
    depth: usize,
    snapshot_ts: DateTime<Utc>,
) {
    for (idx, entry) in entries.iter().take(depth).enumerate() {
        let rank = idx as u32 + 1;
        match parse_entry(entry) {
            Ok((price, size)) => out.push(PriceLevel { snapshot_ts, side, rank, price, size }),
            Err(defect) => {
                warn!(%side, rank, %defect, ?entry, "skipping order book level");
                metrics::counter!("book_levels_skipped_total", "side" => side.as_str()).increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entries(rows: &[&[&str]]) -> Vec<RawEntry> {
        rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    fn snapshot(bids: &[&[&str]], asks: &[&[&str]]) -> RawSnapshot {
        RawSnapshot { bids: entries(bids), asks: entries(asks), ts: "1700000000000".into() }
    }

    fn summary(levels: &[PriceLevel]) -> Vec<(Side, u32, Decimal, Decimal)> {
        levels.iter().map(|l| (l.side, l.rank, l.price, l.size)).collect()
    }

    #[test]
    fn test_timestamp_maps_to_utc() {
        let ts = parse_snapshot_ts("1700000000000").unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let mut raw = snapshot(&[&["1", "1"]], &[]);
        raw.ts = "17e11".into();
        assert!(matches!(extract(&raw, 5), Err(ExtractError::BadTimestamp { .. })));

        raw.ts = i64::MAX.to_string();
        assert!(matches!(extract(&raw, 5), Err(ExtractError::BadTimestamp { .. })));
    }

    #[test]
    fn test_malformed_ask_is_skipped() {
        let raw = snapshot(&[&["100.5", "2"], &["100.4", "1"]], &[&["100.6", "3"], &["bad", "1"]]);
        let levels = extract(&raw, 2).unwrap();
        assert_eq!(
            summary(&levels),
            vec![
                (Side::Bid, 1, Decimal::new(1005, 1), Decimal::from(2)),
                (Side::Bid, 2, Decimal::new(1004, 1), Decimal::from(1)),
                (Side::Ask, 1, Decimal::new(1006, 1), Decimal::from(3)),
            ]
        );
        let expected_ts = parse_snapshot_ts("1700000000000").unwrap();
        assert!(levels.iter().all(|l| l.snapshot_ts == expected_ts));
    }

    #[test]
    fn test_rank_keeps_gap_for_skipped_level() {
        let raw = snapshot(&[&["x", "1"], &["99", "1"], &["98"]], &[]);
        let levels = extract(&raw, 3).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].rank, 2);
    }

    #[test]
    fn test_depth_caps_each_side() {
        let bids: Vec<&[&str]> = vec![&["5", "1"], &["4", "1"], &["3", "1"]];
        let asks: Vec<&[&str]> = vec![&["6", "1"]];
        let levels = extract(&snapshot(&bids, &asks), 2).unwrap();
        assert_eq!(levels.iter().filter(|l| l.side == Side::Bid).count(), 2);
        assert_eq!(levels.iter().filter(|l| l.side == Side::Ask).count(), 1);
    }

    #[test]
    fn test_entries_beyond_depth_are_not_inspected() {
        // the third bid is garbage but sits past depth, so nothing is skipped
        let raw = snapshot(&[&["5", "1"], &["4", "1"], &["bad"]], &[]);
        assert_eq!(extract(&raw, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_book_has_no_valid_levels() {
        assert_eq!(extract(&snapshot(&[], &[]), 5), Err(ExtractError::NoValidLevels { depth: 5 }));
    }

    #[test]
    fn test_all_malformed_has_no_valid_levels() {
        let raw = snapshot(&[&["1"], &["0", "1"]], &[&["-2", "1"]]);
        assert_eq!(extract(&raw, 5), Err(ExtractError::NoValidLevels { depth: 5 }));
    }

    #[test]
    fn test_extract_is_repeatable() {
        let raw = snapshot(&[&["100.5", "2"], &["oops", "1"]], &[&["100.6", "3"]]);
        assert_eq!(extract(&raw, 5).unwrap(), extract(&raw, 5).unwrap());
    }
}
