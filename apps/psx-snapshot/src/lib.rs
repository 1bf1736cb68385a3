// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! PSX Snapshot - Library
//!
//! Ingestion and query pipeline for Pakistan Stock Exchange market data.
//!
//! # Pipeline
//!
//! A background scheduler periodically runs one refresh cycle:
//!
//! 1. **Fetch** — the market-watch HTML quote table and the JSON symbol
//!    directory are fetched concurrently (`feed`).
//! 2. **Reconcile** — directory entries are fuzzy-matched onto quote rows by
//!    symbol similarity and merged into unified records (`reconcile`).
//! 3. **Persist** — records are upserted by symbol into the `SQLite` store
//!    with per-row update stamps (`store`).
//!
//! The HTTP query API (`server`) reads only from the store; it never calls
//! the upstream feeds, so feed outages degrade freshness rather than
//! availability.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading, env interpolation, and validation.
pub mod config;

/// Error taxonomy for feeds, parsing, persistence, and refresh cycles.
pub mod error;

/// Upstream feed clients and parsers.
pub mod feed;

/// Wire and store data shapes.
pub mod models;

/// Fuzzy symbol matching and record merging.
pub mod reconcile;

/// Background refresh scheduling.
pub mod scheduler;

/// Read-only HTTP query API.
pub mod server;

/// `SQLite`-backed snapshot store.
pub mod store;

pub use config::{Config, load_config};
pub use error::{FetchError, ParseError, RefreshError, StoreError};
pub use feed::FeedClient;
pub use models::{LiveQuote, QuoteRow, Snapshot, StockRecord, SymbolInfo};
pub use reconcile::{MATCH_THRESHOLD, Reconciler};
pub use scheduler::{Cadence, RefreshScheduler};
pub use server::{QueryServer, create_router};
pub use store::SnapshotStore;
