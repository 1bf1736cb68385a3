//! Core record types flowing through the snapshot pipeline.
//!
//! `QuoteRow` and `SymbolInfo` are ephemeral: they live only for one
//! reconciliation cycle. `StockRecord` is the unified record the store
//! persists and the read API serves. All quote fields are carried as opaque
//! text exactly as the feeds deliver them; this service caches, it does not
//! validate upstream numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One row of the market-watch quote table, keyed by trading symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRow {
    /// Trading symbol, unique within one fetch cycle.
    pub symbol: String,
    /// Sector label.
    pub sector: String,
    /// Listing venue / index membership.
    pub listed_in: String,
    /// Last day closing price.
    pub ldcp: String,
    /// Opening price.
    pub open: String,
    /// Session high.
    pub high: String,
    /// Session low.
    pub low: String,
    /// Current price.
    pub current: String,
    /// Absolute change.
    pub change: String,
    /// Percent change.
    pub change_percent: String,
    /// Traded volume.
    pub volume: String,
}

/// One entry of the symbol directory feed.
///
/// `symbol` is required; everything else defaults to empty. The exchange is
/// not consistent about the flag types (booleans in some payloads, strings in
/// others), so they are normalized to text at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    /// Directory symbol. May differ from the quote-table symbol for the same
    /// instrument in suffix, case, or punctuation.
    pub symbol: String,
    /// Company display name.
    #[serde(default)]
    pub name: String,
    /// Sector name as the directory spells it.
    #[serde(rename = "sectorName", default)]
    pub sector_name: String,
    /// Exchange-traded-fund flag.
    #[serde(rename = "isETF", default, deserialize_with = "bool_like")]
    pub is_etf: String,
    /// Debt-instrument flag.
    #[serde(rename = "isDebt", default, deserialize_with = "bool_like")]
    pub is_debt: String,
}

/// Accept `true`, `"true"`, `1`, or null for the boolean-like directory flags
/// and carry them downstream as text.
fn bool_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// The merge of one `QuoteRow` with zero-or-one `SymbolInfo`.
///
/// The quote symbol is authoritative; a reference match never overrides it.
/// The four reference-derived fields are set together by one merge or all
/// left empty — there is no partial merge. Wire names follow the original
/// upstream-facing shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Trading symbol (store key).
    #[serde(rename = "SYMBOL")]
    pub symbol: String,
    /// Sector label from the quote table.
    #[serde(rename = "SECTOR")]
    pub sector: String,
    /// Listing venue / index membership.
    #[serde(rename = "LISTED_IN")]
    pub listed_in: String,
    /// Last day closing price.
    #[serde(rename = "LDCP")]
    pub ldcp: String,
    /// Opening price.
    #[serde(rename = "OPEN")]
    pub open: String,
    /// Session high.
    #[serde(rename = "HIGH")]
    pub high: String,
    /// Session low.
    #[serde(rename = "LOW")]
    pub low: String,
    /// Current price.
    #[serde(rename = "CURRENT")]
    pub current: String,
    /// Absolute change.
    #[serde(rename = "CHANGE")]
    pub change: String,
    /// Percent change.
    #[serde(rename = "CHANGE_%")]
    pub change_percent: String,
    /// Traded volume.
    #[serde(rename = "VOLUME")]
    pub volume: String,
    /// Company name from the directory; empty when unmatched.
    #[serde(rename = "NAME")]
    pub name: String,
    /// Sector name from the directory; empty when unmatched.
    #[serde(rename = "SECTOR_NAME")]
    pub sector_name: String,
    /// ETF flag from the directory; empty when unmatched.
    #[serde(rename = "IS_ETF")]
    pub is_etf: String,
    /// Debt flag from the directory; empty when unmatched.
    #[serde(rename = "IS_DEBT")]
    pub is_debt: String,
}

impl StockRecord {
    /// Build an unmatched record from a quote row, reference fields empty.
    #[must_use]
    pub fn from_quote(quote: QuoteRow) -> Self {
        Self {
            symbol: quote.symbol,
            sector: quote.sector,
            listed_in: quote.listed_in,
            ldcp: quote.ldcp,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            current: quote.current,
            change: quote.change,
            change_percent: quote.change_percent,
            volume: quote.volume,
            name: String::new(),
            sector_name: String::new(),
            is_etf: String::new(),
            is_debt: String::new(),
        }
    }

    /// Overwrite all reference-derived fields from one directory entry.
    pub fn apply_reference(&mut self, info: &SymbolInfo) {
        self.name = info.name.clone();
        self.sector_name = info.sector_name.clone();
        self.is_etf = info.is_etf.clone();
        self.is_debt = info.is_debt.clone();
    }
}

/// Lightweight live-quote projection served by `/psx-data/live`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQuote {
    /// Trading symbol.
    #[serde(rename = "SMBL")]
    pub symbol: String,
    /// Company name; empty when unmatched.
    #[serde(rename = "NAME")]
    pub name: String,
    /// Opening price.
    #[serde(rename = "OPEN")]
    pub open: String,
    /// Session high.
    #[serde(rename = "HIGH")]
    pub high: String,
    /// Session low.
    #[serde(rename = "LOW")]
    pub low: String,
    /// Current price.
    #[serde(rename = "CURRENT")]
    pub current: String,
    /// Absolute change.
    #[serde(rename = "CHNG")]
    pub change: String,
    /// Percent change.
    #[serde(rename = "CHNG_%")]
    pub change_percent: String,
    /// Traded volume.
    #[serde(rename = "VOL")]
    pub volume: String,
    /// Last day closing price.
    #[serde(rename = "LDCP")]
    pub ldcp: String,
}

impl From<&StockRecord> for LiveQuote {
    fn from(record: &StockRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            open: record.open.clone(),
            high: record.high.clone(),
            low: record.low.clone(),
            current: record.current.clone(),
            change: record.change.clone(),
            change_percent: record.change_percent.clone(),
            volume: record.volume.clone(),
            ldcp: record.ldcp.clone(),
        }
    }
}

/// Full store content at the moment of a read.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Maximum per-row update stamp, `None` when the store is empty.
    pub last_updated: Option<DateTime<Utc>>,
    /// Every unified record, one per symbol.
    pub stocks: Vec<StockRecord>,
}
