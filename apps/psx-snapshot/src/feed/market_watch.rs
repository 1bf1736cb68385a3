//! Primary feed: the market-watch quote table.
//!
//! The exchange serves live quotes as an HTML page whose first `<table>`
//! holds one row per traded symbol, first row a header, at least 11 columns
//! per data row. Rows shorter than that are skipped, not fatal; a document
//! with no table at all is.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{ParseError, RefreshError};
use crate::models::QuoteRow;

use super::FeedClient;

/// Column count a data row must have to be usable.
const MIN_COLUMNS: usize = 11;

/// Fetch and parse the market-watch table into symbol-keyed quote rows.
///
/// The map is ordered by symbol so downstream reconciliation iterates the
/// primary identifiers in a fixed order.
///
/// # Errors
///
/// `FetchError` when the endpoint is unreachable or answers non-2xx;
/// `ParseError::MissingTable` when the document carries no quote table.
pub async fn fetch(client: &FeedClient) -> Result<BTreeMap<String, QuoteRow>, RefreshError> {
    let url = client.market_watch_url().to_string();
    let body = client.get_text(&url).await?;
    let quotes = parse(&body)?;
    debug!(rows = quotes.len(), "Parsed market-watch table");
    Ok(quotes)
}

/// Parse a market-watch HTML document.
///
/// # Errors
///
/// `ParseError::MissingTable` when no `<table>` is present.
pub fn parse(html: &str) -> Result<BTreeMap<String, QuoteRow>, ParseError> {
    // Static selectors over a fixed document shape; parsing them cannot fail.
    #[allow(clippy::expect_used)]
    let table_selector = Selector::parse("table").expect("static selector 'table' is valid");
    #[allow(clippy::expect_used)]
    let row_selector = Selector::parse("tr").expect("static selector 'tr' is valid");
    #[allow(clippy::expect_used)]
    let cell_selector = Selector::parse("td").expect("static selector 'td' is valid");

    let document = Html::parse_document(html);
    let table = document
        .select(&table_selector)
        .next()
        .ok_or(ParseError::MissingTable)?;

    let mut quotes = BTreeMap::new();

    // First row is the header; it has no <td> cells and falls through the
    // column-count check like any short row.
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() < MIN_COLUMNS {
            if !cells.is_empty() {
                debug!(columns = cells.len(), "Skipping short market-watch row");
            }
            continue;
        }

        let symbol = cells[0].clone();
        quotes.insert(
            symbol.clone(),
            QuoteRow {
                symbol,
                sector: cells[1].clone(),
                listed_in: cells[2].clone(),
                ldcp: cells[3].clone(),
                open: cells[4].clone(),
                high: cells[5].clone(),
                low: cells[6].clone(),
                current: cells[7].clone(),
                change: cells[8].clone(),
                change_percent: cells[9].clone(),
                volume: cells[10].clone(),
            },
        );
    }

    Ok(quotes)
}
