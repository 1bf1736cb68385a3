//! Upstream feed access.
//!
//! Two independently-shaped feeds supply the pipeline:
//! - `market_watch` — the live-quote HTML table (primary feed, authoritative
//!   for which symbols exist).
//! - `symbols` — the JSON symbol directory (reference feed, descriptive
//!   metadata joined on by approximate symbol match).
//!
//! Both go through [`FeedClient`], which enforces the bounded request
//! timeout and the browser-like `User-Agent` the exchange requires.

mod client;
pub mod market_watch;
pub mod symbols;

pub use client::FeedClient;
