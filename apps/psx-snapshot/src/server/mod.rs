//! Read-only query API.
//!
//! Serves whatever the store currently holds; handlers never trigger a feed
//! fetch, so response latency is bounded by a local read.

mod http;

pub use http::{QueryServer, create_router};
