//! Error taxonomy for the snapshot pipeline.
//!
//! Three concerns, three types:
//! - [`FetchError`] — the network call to an upstream feed failed.
//! - [`ParseError`] — the feed responded but its shape was unexpected.
//! - [`StoreError`] — a database operation failed.
//!
//! A fetch or parse failure aborts only the current refresh cycle; a store
//! failure aborts only the affected row. [`RefreshError`] unions all three
//! for reporting one failed cycle.

use thiserror::Error;

/// Network-level failure talking to an upstream feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS, or timeout failure from the HTTP client.
    /// Request timeouts surface here; the client always carries a bounded one.
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The feed answered with a non-success status code.
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// HTTP status code received.
        status: u16,
        /// URL that was requested.
        url: String,
    },
}

/// Structural failure interpreting a feed body.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The market-watch page contained no quote table at all.
    #[error("No table found in market-watch document")]
    MissingTable,

    /// The symbol directory body was not a JSON array.
    #[error("Symbol directory is not a JSON array: {0}")]
    NotAnArray(#[from] serde_json::Error),
}

/// Database failure in the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Pool creation or connection failure.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution failure.
    #[error("Query error: {0}")]
    Query(String),

    /// A fetched row was missing an expected column.
    #[error("Missing field: {0}")]
    MissingField(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Any failure that aborts one refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// An upstream feed could not be reached.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An upstream feed body had an unexpected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The snapshot store rejected the batch outright.
    #[error(transparent)]
    Store(#[from] StoreError),
}
