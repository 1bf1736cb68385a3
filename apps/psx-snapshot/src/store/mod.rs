//! SQLite-backed snapshot store.
//!
//! One table keyed by symbol, one row per unified record, each row carrying
//! its own `updated_at` stamp. The store owns its connection pool; callers
//! never see a connection. The maximum per-row stamp serves as the
//! snapshot's `last_updated`.
//!
//! Writes are per-row upserts inside the pool's row-level transactions;
//! readers during a refresh may observe a mix of old and new rows, which is
//! the consistency model this service promises.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::StoreError;
use crate::models::{Snapshot, StockRecord};

/// Snapshot table schema. `updated_at` is RFC 3339 UTC text, so MAX() over
/// it orders chronologically.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS stocks (
    symbol          TEXT PRIMARY KEY,
    sector          TEXT NOT NULL,
    listed_in       TEXT NOT NULL,
    ldcp            TEXT NOT NULL,
    open            TEXT NOT NULL,
    high            TEXT NOT NULL,
    low             TEXT NOT NULL,
    current         TEXT NOT NULL,
    change          TEXT NOT NULL,
    change_percent  TEXT NOT NULL,
    volume          TEXT NOT NULL,
    name            TEXT NOT NULL,
    sector_name     TEXT NOT NULL,
    is_etf          TEXT NOT NULL,
    is_debt         TEXT NOT NULL,
    updated_at      TEXT NOT NULL
)
";

/// Keyed persistence for unified records.
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    /// Open (creating if missing) the database at the configured path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the pool cannot be created or the
    /// schema cannot be applied.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(
            db_path = %config.db_path,
            max_connections = config.max_connections,
            "SQLite snapshot store opened"
        );

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Apply the schema. Idempotent; existing rows are kept.
    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Upsert every record, one row at a time.
    ///
    /// A new symbol inserts; an existing one overwrites all non-key fields.
    /// Each written row gets `updated_at = now`. A row-level failure is
    /// logged and skipped; the rest of the batch continues. Returns the
    /// number of rows written.
    pub async fn upsert_batch(&self, records: &BTreeMap<String, StockRecord>) -> usize {
        let mut written = 0usize;

        for (symbol, record) in records {
            // Fixed fractional width keeps the text stamps lexicographically
            // ordered, matching their chronological order.
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            match self.upsert_row(record, &stamp).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Row upsert failed, skipping");
                }
            }
        }

        debug!(written, total = records.len(), "Snapshot batch persisted");
        written
    }

    /// Write one row with upsert semantics.
    async fn upsert_row(&self, record: &StockRecord, stamp: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO stocks (
                symbol, sector, listed_in, ldcp, open, high, low, current,
                change, change_percent, volume, name, sector_name, is_etf,
                is_debt, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT (symbol) DO UPDATE SET
                sector = excluded.sector,
                listed_in = excluded.listed_in,
                ldcp = excluded.ldcp,
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                current = excluded.current,
                change = excluded.change,
                change_percent = excluded.change_percent,
                volume = excluded.volume,
                name = excluded.name,
                sector_name = excluded.sector_name,
                is_etf = excluded.is_etf,
                is_debt = excluded.is_debt,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&record.symbol)
        .bind(&record.sector)
        .bind(&record.listed_in)
        .bind(&record.ldcp)
        .bind(&record.open)
        .bind(&record.high)
        .bind(&record.low)
        .bind(&record.current)
        .bind(&record.change)
        .bind(&record.change_percent)
        .bind(&record.volume)
        .bind(&record.name)
        .bind(&record.sector_name)
        .bind(&record.is_etf)
        .bind(&record.is_debt)
        .bind(stamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    /// Read the full snapshot plus the maximum per-row stamp.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the read fails.
    pub async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let rows = sqlx::query("SELECT * FROM stocks ORDER BY symbol")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut stocks = Vec::with_capacity(rows.len());
        let mut last_updated: Option<DateTime<Utc>> = None;

        for row in &rows {
            stocks.push(Self::row_to_record(row)?);
            let stamp: String = row
                .try_get("updated_at")
                .map_err(|e| StoreError::MissingField(format!("updated_at: {e}")))?;
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&stamp) {
                let parsed = parsed.with_timezone(&Utc);
                if last_updated.is_none_or(|current| parsed > current) {
                    last_updated = Some(parsed);
                }
            }
        }

        Ok(Snapshot {
            last_updated,
            stocks,
        })
    }

    /// Exact-match lookup of one record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the read fails; an unknown symbol is
    /// `Ok(None)`, not an error.
    pub async fn get(&self, symbol: &str) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM stocks WHERE symbol = ?1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// Convert a database row to a `StockRecord`.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StockRecord, StoreError> {
        let field = |name: &str| -> Result<String, StoreError> {
            row.try_get::<String, _>(name)
                .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
        };

        Ok(StockRecord {
            symbol: field("symbol")?,
            sector: field("sector")?,
            listed_in: field("listed_in")?,
            ldcp: field("ldcp")?,
            open: field("open")?,
            high: field("high")?,
            low: field("low")?,
            current: field("current")?,
            change: field("change")?,
            change_percent: field("change_percent")?,
            volume: field("volume")?,
            name: field("name")?,
            sector_name: field("sector_name")?,
            is_etf: field("is_etf")?,
            is_debt: field("is_debt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteRow;

    async fn temp_store() -> (SnapshotStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            db_path: dir
                .path()
                .join("test.db")
                .to_string_lossy()
                .into_owned(),
            max_connections: 2,
        };
        let store = SnapshotStore::connect(&config).await.unwrap();
        (store, dir)
    }

    fn record(symbol: &str, current: &str) -> StockRecord {
        StockRecord::from_quote(QuoteRow {
            symbol: symbol.to_string(),
            sector: "0801".to_string(),
            listed_in: "KSE100".to_string(),
            ldcp: "100.00".to_string(),
            open: "100.50".to_string(),
            high: "102.00".to_string(),
            low: "99.80".to_string(),
            current: current.to_string(),
            change: "1.50".to_string(),
            change_percent: "1.5%".to_string(),
            volume: "1,250,000".to_string(),
        })
    }

    fn batch(records: Vec<StockRecord>) -> BTreeMap<String, StockRecord> {
        records
            .into_iter()
            .map(|r| (r.symbol.clone(), r))
            .collect()
    }

    #[tokio::test]
    async fn upsert_then_snapshot_round_trips() {
        let (store, _dir) = temp_store().await;

        let written = store
            .upsert_batch(&batch(vec![record("ABC", "101.50"), record("HUBC", "96.10")]))
            .await;
        assert_eq!(written, 2);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.stocks.len(), 2);
        assert!(snapshot.last_updated.is_some());
        assert_eq!(snapshot.stocks[0].symbol, "ABC");
        assert_eq!(snapshot.stocks[0].current, "101.50");
    }

    #[tokio::test]
    async fn upsert_is_idempotent_with_advancing_stamp() {
        let (store, _dir) = temp_store().await;

        store.upsert_batch(&batch(vec![record("ABC", "101.50")])).await;
        let first = store.snapshot().await.unwrap();

        store.upsert_batch(&batch(vec![record("ABC", "101.50")])).await;
        let second = store.snapshot().await.unwrap();

        // Still one row, same field values, stamp did not move backwards.
        assert_eq!(second.stocks.len(), 1);
        assert_eq!(second.stocks[0], first.stocks[0]);
        assert!(second.last_updated >= first.last_updated);
    }

    #[tokio::test]
    async fn upsert_overwrites_all_non_key_fields() {
        let (store, _dir) = temp_store().await;

        store.upsert_batch(&batch(vec![record("ABC", "101.50")])).await;

        let mut updated = record("ABC", "150.00");
        updated.name = "ABC Corp".to_string();
        updated.sector_name = "Textile".to_string();
        updated.is_etf = "false".to_string();
        updated.is_debt = "false".to_string();
        store.upsert_batch(&batch(vec![updated])).await;

        let fetched = store.get("ABC").await.unwrap().unwrap();
        assert_eq!(fetched.current, "150.00");
        assert_eq!(fetched.name, "ABC Corp");
    }

    #[tokio::test]
    async fn last_updated_is_monotone_across_reads() {
        let (store, _dir) = temp_store().await;

        store.upsert_batch(&batch(vec![record("ABC", "101.50")])).await;
        let first = store.snapshot().await.unwrap().last_updated;

        store.upsert_batch(&batch(vec![record("HUBC", "96.10")])).await;
        let second = store.snapshot().await.unwrap().last_updated;

        assert!(second >= first);
    }

    #[tokio::test]
    async fn unknown_symbol_is_none_not_error() {
        let (store, _dir) = temp_store().await;
        assert!(store.get("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_store_snapshot_has_no_timestamp() {
        let (store, _dir) = temp_store().await;
        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.stocks.is_empty());
        assert!(snapshot.last_updated.is_none());
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            db_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            max_connections: 2,
        };

        {
            let store = SnapshotStore::connect(&config).await.unwrap();
            store.upsert_batch(&batch(vec![record("ABC", "101.50")])).await;
        }

        let reopened = SnapshotStore::connect(&config).await.unwrap();
        let snapshot = reopened.snapshot().await.unwrap();
        assert_eq!(snapshot.stocks.len(), 1);
        assert_eq!(snapshot.stocks[0].symbol, "ABC");
    }
}
