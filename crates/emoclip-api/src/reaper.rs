//! Background sweep that drops finished jobs once their retention expires.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::info;

use crate::state::AppState;

/// Interval between retention sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically prunes finished jobs from the in-memory registry.
pub struct JobReaper {
    state: AppState,
}

impl JobReaper {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run forever; spawn this as a background task.
    pub async fn run(&self) {
        info!(
            "Starting job reaper (interval: {:?}, retention: {:?})",
            SWEEP_INTERVAL, self.state.config.job_retention
        );

        let mut ticker = interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            self.state.prune_finished_jobs(Utc::now()).await;
        }
    }
}
