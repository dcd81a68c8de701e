use crate::state::AgentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Periodically expire stale move indicators.
///
/// Runs regardless of event traffic, so markers do not linger on an idle
/// connection. Runs until the task is aborted.
pub async fn run_indicator_sweeper(store: Arc<AgentStore>, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "Starting move indicator sweeper");

    let mut ticker = interval(period);

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        store.sweep_expired();
    }
}
