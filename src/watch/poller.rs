// Poll cycle: fetch each watched account once, then detect, filter,
// deliver and advance the watermark for every subscription on it.
//
// Failures stay at the granularity they happen at: a bad fetch skips one
// account, a bad send skips one post, a failed watermark write skips one
// subscription. Only failing to read the subscription list aborts the cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::detector::detect_new;
use super::dispatch::Dispatcher;
use super::filter::ContentFilter;
use super::watermark::WatermarkStore;
use crate::db::models::Subscription;
use crate::db::Database;
use crate::timeline::{FetchError, Post, SharedTimeline};

pub const DEFAULT_FETCH_LIMIT: u32 = 20;
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// How many recent posts to request per account.
    pub fetch_limit: u32,
    /// Wait inserted after an upstream rate-limit before the next account,
    /// unless the source said how long to wait.
    pub rate_limit_pause: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            rate_limit_pause: DEFAULT_RATE_LIMIT_PAUSE,
        }
    }
}

/// Counts from one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accounts_checked: usize,
    pub accounts_failed: usize,
    pub accounts_empty: usize,
    pub subscriptions_processed: usize,
    pub subscriptions_initialized: usize,
    pub subscriptions_failed: usize,
    pub posts_delivered: usize,
    pub posts_failed: usize,
    pub posts_filtered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the guard; nothing was done.
    AlreadyRunning,
}

pub struct Poller {
    db: Arc<dyn Database>,
    timeline: Arc<SharedTimeline>,
    dispatcher: Dispatcher,
    watermarks: WatermarkStore,
    settings: PollSettings,
    cycle_lock: Mutex<()>,
}

impl Poller {
    pub fn new(
        db: Arc<dyn Database>,
        timeline: Arc<SharedTimeline>,
        dispatcher: Dispatcher,
        settings: PollSettings,
    ) -> Self {
        Self {
            watermarks: WatermarkStore::new(db.clone()),
            db,
            timeline,
            dispatcher,
            settings,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Run one poll cycle, unless one is already in flight.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("Previous poll cycle still running, skipping this one");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let subs = self
            .db
            .list_active_subscriptions()
            .await
            .context("Failed to load active subscriptions")?;

        let mut by_account: BTreeMap<String, Vec<Subscription>> = BTreeMap::new();
        for sub in subs {
            by_account.entry(sub.account_id.clone()).or_default().push(sub);
        }

        let mut report = CycleReport::default();
        if by_account.is_empty() {
            debug!("No active subscriptions");
            return Ok(CycleOutcome::Completed(report));
        }

        let source = self.timeline.get().await?;
        let total = by_account.len();
        info!(accounts = total, "Starting poll cycle");

        for (i, (account_id, subs)) in by_account.iter().enumerate() {
            report.accounts_checked += 1;
            let handle = &subs[0].account_handle;

            let batch = match source
                .fetch_recent(account_id, self.settings.fetch_limit)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    report.accounts_failed += 1;
                    warn!(account_id = %account_id, handle = %handle, error = %e, "Timeline fetch failed, skipping account");
                    match e {
                        FetchError::RateLimited { retry_after } if i + 1 < total => {
                            let pause = retry_after.unwrap_or(self.settings.rate_limit_pause);
                            info!(pause_secs = pause.as_secs(), "Rate limited, pausing before next account");
                            tokio::time::sleep(pause).await;
                        }
                        FetchError::Unauthorized => {
                            // Rebuild the client on the next cycle.
                            self.timeline.reset().await;
                        }
                        _ => {}
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                report.accounts_empty += 1;
                debug!(account_id = %account_id, handle = %handle, "No posts returned");
                continue;
            }

            for sub in subs {
                self.process_subscription(sub, &batch, &mut report).await;
            }
        }

        info!(
            accounts = report.accounts_checked,
            failed_accounts = report.accounts_failed,
            delivered = report.posts_delivered,
            failed_posts = report.posts_failed,
            filtered = report.posts_filtered,
            "Poll cycle complete"
        );
        Ok(CycleOutcome::Completed(report))
    }

    async fn process_subscription(&self, sub: &Subscription, batch: &[Post], report: &mut CycleReport) {
        report.subscriptions_processed += 1;
        let detection = detect_new(sub.watermark.as_ref(), batch);

        let Some(next) = detection.next_watermark else {
            return;
        };

        if sub.watermark.is_none() {
            report.subscriptions_initialized += 1;
            info!(
                account = %sub.account_handle,
                channel = %sub.channel_id,
                watermark = %next,
                "Initialized watermark"
            );
        } else if !detection.new_posts.is_empty() {
            let filter = ContentFilter::compile(sub.filter_pattern.as_deref());
            let (wanted, skipped): (Vec<Post>, Vec<Post>) = detection
                .new_posts
                .into_iter()
                .partition(|post| filter.allows(post));
            report.posts_filtered += skipped.len();

            if !wanted.is_empty() {
                let outcome = self.dispatcher.deliver(sub, &wanted).await;
                report.posts_delivered += outcome.delivered;
                report.posts_failed += outcome.failed.len();
                info!(
                    account = %sub.account_handle,
                    channel = %sub.channel_id,
                    delivered = outcome.delivered,
                    failed = outcome.failed.len(),
                    "Delivered new posts"
                );
            }
        }

        if let Err(e) = self.watermarks.advance(sub, &next).await {
            report.subscriptions_failed += 1;
            warn!(error = %e, "Watermark not advanced");
        }
    }
}
