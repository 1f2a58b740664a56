//! Background scheduler for the daily history backfill.
//!
//! Runs a fixed daily interval over the configured tracked symbols.

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::main_lib::AppState;

/// Backfill interval: once a day, matching the cadence of daily closes.
const BACKFILL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Initial delay before the first run (60 seconds to let the server
/// fully start).
const INITIAL_DELAY_SECS: u64 = 60;

/// Days of history per symbol on each run.
const BACKFILL_DAYS: i64 = 365;

/// Starts the background backfill scheduler.
pub fn start_backfill_scheduler(state: Arc<AppState>) {
    tokio::spawn(async move {
        info!("history backfill scheduler started (daily interval)");

        tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

        let mut backfill_interval = interval(Duration::from_secs(BACKFILL_INTERVAL_SECS));

        loop {
            backfill_interval.tick().await;
            run_scheduled_backfill(&state).await;
        }
    });
}

/// Runs a single scheduled backfill pass.
async fn run_scheduled_backfill(state: &Arc<AppState>) {
    if state.tracked_symbols.is_empty() {
        debug!("scheduled backfill skipped: no tracked symbols configured");
        return;
    }

    info!(
        "running scheduled backfill over {} symbols",
        state.tracked_symbols.len()
    );

    let summary = state
        .history_service
        .backfill(&state.tracked_symbols, BACKFILL_DAYS)
        .await;

    if summary.failed > 0 {
        warn!(
            "scheduled backfill finished: {} ok, {} failed of {}",
            summary.success, summary.failed, summary.total
        );
    } else {
        info!(
            "scheduled backfill finished: {} of {} symbols updated",
            summary.success, summary.total
        );
    }
}
