//! Background refresh scheduler.
//!
//! One task per process drives the fetch → reconcile → persist cycle on a
//! configured cadence, independent of request traffic. Cycles run serially
//! inside the task, so two never overlap. A cycle that fails is logged and
//! the next one is scheduled normally — no retry, no backoff; the cache
//! simply stays stale until the next trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{SchedulerConfig, SchedulerMode, parse_daily_time};
use crate::error::RefreshError;
use crate::feed::{FeedClient, market_watch, symbols};
use crate::reconcile::Reconciler;
use crate::store::SnapshotStore;

/// When the next refresh cycle should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed sleep between cycles.
    Interval(Duration),
    /// Daily at a wall-clock time in a fixed UTC offset.
    Daily {
        /// Trigger time of day.
        time: NaiveTime,
        /// The offset the time is anchored in.
        offset: FixedOffset,
    },
}

impl Cadence {
    /// Build from configuration.
    ///
    /// Configuration is validated at load time; an unparseable daily time or
    /// offset here falls back to the interval policy rather than panicking.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        match config.mode {
            SchedulerMode::Interval => Self::Interval(Duration::from_secs(config.interval_secs)),
            SchedulerMode::Daily => {
                let time = parse_daily_time(&config.daily_time);
                let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600);
                match (time, offset) {
                    (Some(time), Some(offset)) => Self::Daily { time, offset },
                    _ => {
                        warn!(
                            daily_time = %config.daily_time,
                            utc_offset_hours = config.utc_offset_hours,
                            "Invalid daily cadence, falling back to interval"
                        );
                        Self::Interval(Duration::from_secs(config.interval_secs))
                    }
                }
            }
        }
    }

    /// Sleep duration from `now` until the next trigger.
    ///
    /// In daily mode, a target time that has already passed today rolls to
    /// tomorrow.
    #[must_use]
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Self::Interval(duration) => duration,
            Self::Daily { time, offset } => {
                let local_now = now.with_timezone(&offset);
                let mut target_date = local_now.date_naive();
                if local_now.time() >= time {
                    target_date = target_date
                        .checked_add_days(Days::new(1))
                        .unwrap_or(target_date);
                }
                let target = target_date.and_time(time);
                // A fixed offset has no gaps or folds; this is always single.
                match offset.from_local_datetime(&target).single() {
                    Some(target) => (target.with_timezone(&Utc) - now)
                        .to_std()
                        .unwrap_or(Duration::from_secs(0)),
                    None => Duration::from_secs(60),
                }
            }
        }
    }
}

/// Drives refresh cycles against the store.
pub struct RefreshScheduler {
    client: FeedClient,
    reconciler: Reconciler,
    store: Arc<SnapshotStore>,
    cadence: Cadence,
}

impl RefreshScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(
        client: FeedClient,
        reconciler: Reconciler,
        store: Arc<SnapshotStore>,
        cadence: Cadence,
    ) -> Self {
        Self {
            client,
            reconciler,
            store,
            cadence,
        }
    }

    /// Run until the token is cancelled at process shutdown.
    ///
    /// The sleep is the only cancellation point; once a cycle has started
    /// fetching it runs to completion, bounded by the feed timeouts.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(cadence = ?self.cadence, "Starting refresh scheduler");

        loop {
            let delay = self.cadence.next_delay(Utc::now());

            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Refresh scheduler shutting down");
                    break;
                }
                () = tokio::time::sleep(delay) => {
                    match self.run_cycle().await {
                        Ok(written) => {
                            info!(rows = written, "Refresh cycle completed");
                        }
                        Err(e) => {
                            warn!(error = %e, "Refresh cycle failed, waiting for next trigger");
                        }
                    }
                }
            }
        }
    }

    /// One fetch → reconcile → persist cycle.
    ///
    /// Both feeds are fetched concurrently; reconciliation and the upsert
    /// touch only local state until the store writes. Returns rows written.
    pub async fn run_cycle(&self) -> Result<usize, RefreshError> {
        let (quotes, directory) = tokio::try_join!(
            market_watch::fetch(&self.client),
            symbols::fetch(&self.client),
        )?;

        info!(
            quotes = quotes.len(),
            directory = directory.len(),
            "Feeds fetched"
        );

        let records = self.reconciler.reconcile(quotes, &directory);
        Ok(self.store.upsert_batch(&records).await)
    }
}
