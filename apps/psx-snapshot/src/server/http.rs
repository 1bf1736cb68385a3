//! HTTP/JSON query endpoints.
//!
//! Every route answers `200 OK`, including a symbol lookup that finds
//! nothing; the miss is reported in the body. A store read failure is logged
//! and answered with the empty snapshot shape so dashboards polling the API
//! degrade to "no data" rather than an error page.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LiveQuote, Snapshot, StockRecord};
use crate::store::SnapshotStore;

/// Shared state for the query server.
#[derive(Clone)]
pub struct QueryServer {
    store: Arc<SnapshotStore>,
}

impl QueryServer {
    /// Create a new query server over a store handle.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Read the snapshot, substituting the empty shape on failure.
    async fn snapshot_or_empty(&self) -> Snapshot {
        match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Snapshot read failed, serving empty response");
                Snapshot {
                    last_updated: None,
                    stocks: Vec::new(),
                }
            }
        }
    }
}

/// Create the Axum router with all endpoints.
#[must_use]
pub fn create_router(server: QueryServer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/psx-data", get(full_snapshot))
        .route("/psx-data/live", get(live_snapshot))
        .route("/psx-data/last-updated", get(last_updated))
        .route("/psx-data/stock", get(stock_lookup))
        .with_state(server)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Full snapshot endpoint.
async fn full_snapshot(State(server): State<QueryServer>) -> Json<Snapshot> {
    Json(server.snapshot_or_empty().await)
}

/// Live-view response body.
#[derive(Debug, Serialize)]
pub struct LiveSnapshotResponse {
    /// Maximum per-row update stamp, `None` when the store is empty.
    pub last_updated: Option<DateTime<Utc>>,
    /// One compact quote per symbol.
    pub stocks: Vec<LiveQuote>,
}

/// Projected live view endpoint.
async fn live_snapshot(State(server): State<QueryServer>) -> Json<LiveSnapshotResponse> {
    let snapshot = server.snapshot_or_empty().await;
    Json(LiveSnapshotResponse {
        last_updated: snapshot.last_updated,
        stocks: snapshot.stocks.iter().map(LiveQuote::from).collect(),
    })
}

/// Freshness-only response body.
#[derive(Debug, Serialize)]
pub struct LastUpdatedResponse {
    /// Maximum per-row update stamp, `None` when the store is empty.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Freshness probe endpoint.
async fn last_updated(State(server): State<QueryServer>) -> Json<LastUpdatedResponse> {
    let snapshot = server.snapshot_or_empty().await;
    Json(LastUpdatedResponse {
        last_updated: snapshot.last_updated,
    })
}

/// Query string for the symbol lookup.
#[derive(Debug, Deserialize)]
pub struct StockQuery {
    /// Exact symbol to look up, compared case-sensitively.
    pub symbol: Option<String>,
}

/// Single-symbol lookup response body.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StockResponse {
    /// The symbol exists in the store.
    Found {
        /// The matching record.
        stock: StockRecord,
    },
    /// No such symbol, or the parameter was missing.
    NotFound {
        /// Fixed miss marker.
        error: &'static str,
    },
}

const NOT_FOUND: StockResponse = StockResponse::NotFound { error: "not found" };

/// Exact-match symbol lookup endpoint.
async fn stock_lookup(
    State(server): State<QueryServer>,
    Query(query): Query<StockQuery>,
) -> Json<StockResponse> {
    let Some(symbol) = query.symbol else {
        return Json(NOT_FOUND);
    };

    match server.store.get(&symbol).await {
        Ok(Some(stock)) => Json(StockResponse::Found { stock }),
        Ok(None) => Json(NOT_FOUND),
        Err(e) => {
            tracing::error!(error = %e, symbol = %symbol, "Stock lookup failed");
            Json(NOT_FOUND)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::models::QuoteRow;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn record(symbol: &str) -> StockRecord {
        let mut record = StockRecord::from_quote(QuoteRow {
            symbol: symbol.to_string(),
            sector: "0810".to_string(),
            listed_in: "KSE100".to_string(),
            ldcp: "100.00".to_string(),
            open: "101.00".to_string(),
            high: "103.50".to_string(),
            low: "99.80".to_string(),
            current: "102.25".to_string(),
            change: "2.25".to_string(),
            change_percent: "2.25%".to_string(),
            volume: "1,234,567".to_string(),
        });
        record.apply_reference(&crate::models::SymbolInfo {
            symbol: symbol.to_string(),
            name: format!("{symbol} Limited"),
            sector_name: "Power Generation".to_string(),
            is_etf: "false".to_string(),
            is_debt: "false".to_string(),
        });
        record
    }

    async fn make_server(dir: &tempfile::TempDir) -> QueryServer {
        let config = PersistenceConfig {
            db_path: dir
                .path()
                .join("query.db")
                .to_string_lossy()
                .into_owned(),
            max_connections: 2,
        };
        let store = SnapshotStore::connect(&config).await.unwrap();

        let mut records = BTreeMap::new();
        records.insert("HUBC".to_string(), record("HUBC"));
        records.insert("OGDC".to_string(), record("OGDC"));
        store.upsert_batch(&records).await;

        QueryServer::new(Arc::new(store))
    }

    async fn get_json(server: QueryServer, uri: &str) -> serde_json::Value {
        let response = create_router(server)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(make_server(&dir).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_full_snapshot_lists_all_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data").await;

        let stocks = body["stocks"].as_array().unwrap();
        assert_eq!(stocks.len(), 2);
        assert_eq!(stocks[0]["SYMBOL"], "HUBC");
        assert_eq!(stocks[0]["NAME"], "HUBC Limited");
        assert_eq!(stocks[1]["SYMBOL"], "OGDC");
        assert!(body["last_updated"].is_string());
    }

    #[tokio::test]
    async fn test_live_snapshot_uses_projected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/live").await;

        let stocks = body["stocks"].as_array().unwrap();
        assert_eq!(stocks.len(), 2);
        let first = stocks[0].as_object().unwrap();
        assert_eq!(first["SMBL"], "HUBC");
        assert_eq!(first["CHNG"], "2.25");
        assert_eq!(first["CHNG_%"], "2.25%");
        assert_eq!(first["VOL"], "1,234,567");
        // Projection drops the sector and listing columns.
        assert!(!first.contains_key("SECTOR"));
        assert!(!first.contains_key("LISTED_IN"));
    }

    #[tokio::test]
    async fn test_last_updated_only() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/last-updated").await;

        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["last_updated"].is_string());
    }

    #[tokio::test]
    async fn test_stock_lookup_hit() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/stock?symbol=OGDC").await;

        assert_eq!(body["stock"]["SYMBOL"], "OGDC");
        assert_eq!(body["stock"]["NAME"], "OGDC Limited");
    }

    #[tokio::test]
    async fn test_stock_lookup_miss_is_200_with_error_body() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/stock?symbol=NOPE").await;

        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn test_stock_lookup_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/stock?symbol=ogdc").await;

        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn test_stock_lookup_without_symbol_param() {
        let dir = tempfile::tempdir().unwrap();
        let body = get_json(make_server(&dir).await, "/psx-data/stock").await;

        assert_eq!(body["error"], "not found");
    }
}
