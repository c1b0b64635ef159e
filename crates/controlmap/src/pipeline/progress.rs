use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::broadcast::job_store::RUNNING_PROGRESS_CAP;
use crate::broadcast::BatchStore;

/// Percentage reported once the agent has been launched.
pub const AGENT_STARTED: u8 = 10;

/// Heuristic progress for an agent run that reports nothing on its own.
///
/// Progress grows linearly with `elapsed / timeout` from [`AGENT_STARTED`]
/// to the running cap. It never reaches completion, which is reserved for
/// the terminal write.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEstimator {
    timeout: Duration,
}

impl ProgressEstimator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn estimate(&self, elapsed: Duration) -> (u8, &'static str) {
        let ratio = if self.timeout.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.timeout.as_secs_f64()).min(1.0)
        };

        let span = f64::from(RUNNING_PROGRESS_CAP - AGENT_STARTED);
        let percentage = AGENT_STARTED + (ratio * span).floor() as u8;

        let message = match ratio {
            r if r < 0.1 => "Starting agent...",
            r if r < 0.5 => "Analyzing framework document...",
            r if r < 0.85 => "Processing controls...",
            _ => "Finalizing...",
        };

        (percentage.min(RUNNING_PROGRESS_CAP), message)
    }
}

/// Periodically writes the estimate for a running job. Stops when dropped
/// or when the job is no longer running.
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(
        store: Arc<BatchStore>,
        job_id: String,
        estimator: ProgressEstimator,
        tick: Duration,
    ) -> Self {
        // A zero period would panic in `interval_at`.
        let tick = tick.max(Duration::from_millis(1));
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(started + tick, tick);
            loop {
                interval.tick().await;
                let (percentage, message) = estimator.estimate(started.elapsed());
                if let Err(e) = store.update_progress(&job_id, percentage, message) {
                    debug!(job_id = %job_id, "Progress ticker stopping: {}", e);
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::job::{Batch, JobStatus};

    #[test]
    fn test_estimate_is_monotonic_and_capped() {
        let estimator = ProgressEstimator::new(Duration::from_secs(600));
        let mut last = 0;
        for secs in (0..=900).step_by(15) {
            let (percentage, _) = estimator.estimate(Duration::from_secs(secs));
            assert!(percentage >= last, "regressed at {}s", secs);
            assert!(percentage <= RUNNING_PROGRESS_CAP);
            last = percentage;
        }
        assert_eq!(last, RUNNING_PROGRESS_CAP);
    }

    #[test]
    fn test_estimate_buckets() {
        let estimator = ProgressEstimator::new(Duration::from_secs(100));
        assert_eq!(estimator.estimate(Duration::ZERO), (AGENT_STARTED, "Starting agent..."));
        assert_eq!(
            estimator.estimate(Duration::from_secs(20)).1,
            "Analyzing framework document..."
        );
        assert_eq!(estimator.estimate(Duration::from_secs(60)).1, "Processing controls...");
        assert_eq!(estimator.estimate(Duration::from_secs(95)).1, "Finalizing...");
    }

    #[test]
    fn test_zero_timeout_goes_straight_to_cap() {
        let estimator = ProgressEstimator::new(Duration::ZERO);
        assert_eq!(estimator.estimate(Duration::ZERO).0, RUNNING_PROGRESS_CAP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_advances_running_job() {
        let store = Arc::new(BatchStore::default());
        let (batch, jobs) = Batch::with_jobs("cfg", "up", "CIS", &["aws".to_string()]);
        store.insert_batch(batch.clone(), jobs).unwrap();
        let job_id = batch.job_ids[0].clone();
        store.start_job(&job_id, "go").unwrap();

        let ticker = ProgressTicker::spawn(
            Arc::clone(&store),
            job_id.clone(),
            ProgressEstimator::new(Duration::from_secs(100)),
            Duration::from_secs(3),
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        let job = store.job(&job_id).unwrap();
        assert!(job.progress_percentage > AGENT_STARTED);
        assert_eq!(job.progress_message, "Analyzing framework document...");

        store.fail_job(&job_id, "boom").unwrap();
        let failed_at = store.job(&job_id).unwrap().progress_percentage;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let job = store.job(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress_percentage, failed_at);
        drop(ticker);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_survives_zero_period() {
        let store = Arc::new(BatchStore::default());
        let (batch, jobs) = Batch::with_jobs("cfg", "up", "CIS", &["aws".to_string()]);
        store.insert_batch(batch.clone(), jobs).unwrap();
        let job_id = batch.job_ids[0].clone();
        store.start_job(&job_id, "go").unwrap();

        let ticker = ProgressTicker::spawn(
            Arc::clone(&store),
            job_id.clone(),
            ProgressEstimator::new(Duration::from_secs(1)),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!ticker.handle.is_finished());
        assert!(store.job(&job_id).unwrap().progress_percentage > AGENT_STARTED);
        drop(ticker);
    }
}
