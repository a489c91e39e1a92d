// Source: https://www.okx.com/docs-v5/en/#order-book-trading-market-data-get-order-book
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::market_data::types::{RawEntry, RawSnapshot};

#[derive(Debug, Deserialize)]
pub struct BooksResponse {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<BookData>,
}

// Sides and timestamp decode leniently: a defect must cost one level (or
// surface as a bad timestamp), never the whole response.
#[derive(Debug, Deserialize)]
pub struct BookData {
    #[serde(default, deserialize_with = "lenient_side")]
    pub asks: Vec<RawEntry>, // [price, size, liquidated_orders, order_count]
    #[serde(default, deserialize_with = "lenient_side")]
    pub bids: Vec<RawEntry>,
    #[serde(default)]
    pub ts: Option<String>, // milliseconds
}

impl From<BookData> for RawSnapshot {
    fn from(data: BookData) -> Self {
        RawSnapshot { bids: data.bids, asks: data.asks, ts: data.ts.unwrap_or_default() }
    }
}

/// `null` side becomes empty, `null` entry becomes `[]`, and each field
/// becomes a string (`null` as `""`) for the normaliser to judge.
fn lenient_side<'de, D>(deserializer: D) -> Result<Vec<RawEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let side: Option<Vec<Option<Vec<Value>>>> = Option::deserialize(deserializer)?;
    Ok(side
        .unwrap_or_default()
        .into_iter()
        .map(|entry| entry.unwrap_or_default().into_iter().map(field_text).collect())
        .collect())
}

fn field_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
