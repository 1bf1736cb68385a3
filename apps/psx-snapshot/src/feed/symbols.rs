//! Reference feed: the symbol directory.
//!
//! A JSON array of objects carrying descriptive metadata per symbol. An
//! entry that cannot be deserialized (most commonly a missing `symbol`
//! field) is skipped with a warning rather than failing the whole fetch.

use tracing::warn;

use crate::error::{ParseError, RefreshError};
use crate::models::SymbolInfo;

use super::FeedClient;

/// Fetch and parse the symbol directory, in feed order.
///
/// # Errors
///
/// `FetchError` when the endpoint is unreachable or answers non-2xx;
/// `ParseError::NotAnArray` when the body is not a JSON array.
pub async fn fetch(client: &FeedClient) -> Result<Vec<SymbolInfo>, RefreshError> {
    let url = client.symbols_url().to_string();
    let body = client.get_text(&url).await?;
    Ok(parse(&body)?)
}

/// Parse a raw JSON body into directory entries.
///
/// # Errors
///
/// `ParseError::NotAnArray` when the body is not a JSON array.
pub fn parse(body: &str) -> Result<Vec<SymbolInfo>, ParseError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(parse_entries(entries))
}

/// Deserialize each entry leniently, skipping malformed ones.
fn parse_entries(entries: Vec<serde_json::Value>) -> Vec<SymbolInfo> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<SymbolInfo>(entry) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "Skipping malformed symbol directory entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_in_order() {
        let body = r#"[
            {"symbol":"ABC1","name":"ABC Corp","sectorName":"Textile","isETF":false,"isDebt":false},
            {"symbol":"HUBCO","name":"Hub Power","sectorName":"Power","isETF":false,"isDebt":false}
        ]"#;
        let infos = parse(body).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].symbol, "ABC1");
        assert_eq!(infos[0].name, "ABC Corp");
        assert_eq!(infos[1].symbol, "HUBCO");
    }

    #[test]
    fn entry_without_symbol_is_skipped() {
        let body = r#"[
            {"name":"Orphan Ltd"},
            {"symbol":"OK","name":"Still Parsed"}
        ]"#;
        let infos = parse(body).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].symbol, "OK");
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let infos = parse(r#"[{"symbol":"BARE"}]"#).unwrap();
        assert_eq!(infos[0].symbol, "BARE");
        assert!(infos[0].name.is_empty());
        assert!(infos[0].sector_name.is_empty());
        assert!(infos[0].is_etf.is_empty());
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        let err = parse(r#"{"error":"rate limited"}"#).unwrap_err();
        assert!(matches!(err, ParseError::NotAnArray(_)));
    }
}
