// Convert wire strings into validated decimals.
// A defect here only ever costs the single level it was found in.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Why a single `[price, size, ...]` entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelDefect {
    /// Fewer than two fields.
    Incomplete { fields: usize },
    BadPrice(String),
    BadSize(String),
}

impl fmt::Display for LevelDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelDefect::Incomplete { fields } => write!(f, "incomplete entry ({} fields)", fields),
            LevelDefect::BadPrice(raw) => write!(f, "unparsable price {:?}", raw),
            LevelDefect::BadSize(raw) => write!(f, "unparsable size {:?}", raw),
        }
    }
}

/// Parse a decimal string, accepting it only when strictly positive.
pub fn parse_positive(s: &str) -> Option<Decimal> {
    if !is_plain_decimal(s) {
        return None;
    }
    Decimal::from_str(s).ok().filter(|d| d.is_sign_positive() && !d.is_zero())
}

// Optional sign, then digits and dots only. `Decimal::from_str` would
// otherwise accept `_` separators.
fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Pull `(price, size)` out of a venue entry. Trailing fields (liquidated
/// orders, order count) are ignored.
pub fn parse_entry(entry: &[String]) -> Result<(Decimal, Decimal), LevelDefect> {
    let (price_raw, size_raw) = match entry {
        [price, size, ..] => (price, size),
        _ => return Err(LevelDefect::Incomplete { fields: entry.len() }),
    };

    let price = parse_positive(price_raw).ok_or_else(|| LevelDefect::BadPrice(price_raw.clone()))?;
    let size = parse_positive(size_raw).ok_or_else(|| LevelDefect::BadSize(size_raw.clone()))?;
    Ok((price, size))
}
