// Timer loop: starts a poll cycle every interval until shutdown.
//
// Each cycle runs on its own task so a stalled fetch can't delay the timer.
// A tick that lands while the previous cycle is still running is skipped,
// and shutdown waits for the running cycle so its watermarks get written.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::poller::{CycleOutcome, Poller};

pub const MIN_INTERVAL: Duration = Duration::from_secs(60);
pub const LAST_CYCLE_KEY: &str = "last_cycle_at";
/// How long shutdown waits for a running cycle before abandoning it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Run cycles on `interval` until `shutdown` resolves. The first cycle
/// starts immediately.
pub async fn run<F>(poller: Arc<Poller>, interval: Duration, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    if interval < MIN_INTERVAL {
        bail!(
            "Poll interval must be at least {} seconds (got {})",
            MIN_INTERVAL.as_secs(),
            interval.as_secs()
        );
    }
    run_unchecked(poller, interval, SHUTDOWN_GRACE, shutdown).await;
    Ok(())
}

pub(crate) async fn run_unchecked<F>(
    poller: Arc<Poller>,
    interval: Duration,
    grace: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(interval_secs = interval.as_secs(), "Scheduler started");
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Some(handle) = in_flight.take() {
                    finish_in_flight(handle, grace).await;
                }
                info!("Scheduler stopped");
                return;
            }
            _ = ticker.tick() => {
                if in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                    warn!("Previous poll cycle still running, skipping this tick");
                } else {
                    let poller = poller.clone();
                    in_flight = Some(tokio::spawn(async move {
                        run_and_record(&poller).await;
                    }));
                }
            }
        }
    }
}

async fn finish_in_flight(mut handle: JoinHandle<()>, grace: Duration) {
    if handle.is_finished() {
        return;
    }
    info!(grace_secs = grace.as_secs(), "Waiting for the running poll cycle to finish");
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Poll cycle task failed"),
        Err(_) => {
            warn!("Poll cycle still running after the grace period, aborting it; posts sent but not yet recorded will be sent again next run");
            handle.abort();
        }
    }
}

/// One cycle plus bookkeeping of when it finished.
pub async fn run_and_record(poller: &Poller) -> Option<CycleOutcome> {
    match poller.run_cycle().await {
        Ok(outcome) => {
            if matches!(outcome, CycleOutcome::Completed(_)) {
                let now = chrono::Utc::now().to_rfc3339();
                if let Err(e) = poller.database().set_scan_state(LAST_CYCLE_KEY, &now).await {
                    error!(error = %e, "Failed to record cycle time");
                }
            }
            Some(outcome)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Poll cycle failed");
            None
        }
    }
}
