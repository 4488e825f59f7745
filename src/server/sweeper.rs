use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{common::types::now_ms, server::AppState};

/// Periodically drops silent participants to grace, expires grace and reaps closed
/// parties.
pub fn spawn_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let period = Duration::from_millis(state.config.party.sweep_interval_ms.max(10));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let removed = state.directory.sweep(now_ms());
            if removed > 0 {
                debug!(
                    "Sweep removed {} parties, {} live",
                    removed,
                    state.directory.len()
                );
            }
        }
    })
}
