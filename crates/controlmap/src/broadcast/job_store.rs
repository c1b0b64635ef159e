//! In-memory batch and job store.
//!
//! Every mutation happens under one write lock and is published on the
//! progress broadcaster after the lock is released. Status queries copy the
//! batch and its jobs under a single read lock, so a snapshot never mixes
//! two points in time.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::broadcast::job_progress::{JobProgressBroadcaster, JobProgressEvent};
use crate::error::{ControlMapError, Result};
use crate::mapping::MappingSummary;
use crate::worker::job::{ArtifactRefs, Batch, Job, JobStatus};

/// Highest percentage a job may show before it completes.
pub const RUNNING_PROGRESS_CAP: u8 = 94;

#[derive(Default)]
struct Inner {
    batches: HashMap<String, Batch>,
    jobs: HashMap<String, Job>,
}

impl Inner {
    fn job_mut(&mut self, job_id: &str) -> Result<&mut Job> {
        self.jobs
            .get_mut(job_id)
            .ok_or_else(|| ControlMapError::not_found("Job", job_id))
    }

    fn batch_is_active(&self, batch: &Batch) -> bool {
        batch
            .job_ids
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .any(|job| !job.status.is_terminal())
    }

    /// Stamps `completed_at` on the batch once its last job is terminal.
    fn close_batch_if_done(&mut self, batch_id: &str) {
        let done = match self.batches.get(batch_id) {
            Some(batch) => batch.completed_at.is_none() && !self.batch_is_active(batch),
            None => false,
        };
        if done {
            if let Some(batch) = self.batches.get_mut(batch_id) {
                batch.completed_at = Some(Utc::now());
            }
        }
    }
}

fn transition(job: &mut Job, to: JobStatus) -> Result<()> {
    if !job.status.can_transition_to(to) {
        return Err(ControlMapError::InvalidTransition {
            job_id: job.id.clone(),
            from: job.status.to_string(),
            to: to.to_string(),
        });
    }
    job.status = to;
    job.updated_at = Utc::now();
    Ok(())
}

pub struct BatchStore {
    inner: RwLock<Inner>,
    progress: JobProgressBroadcaster,
}

impl BatchStore {
    pub fn new(progress: JobProgressBroadcaster) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            progress,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Batch store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Batch store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn broadcaster(&self) -> &JobProgressBroadcaster {
        &self.progress
    }

    /// Inserts a batch with all of its jobs, refusing when another batch of
    /// the same configuration still has unfinished jobs.
    pub fn insert_batch(&self, batch: Batch, jobs: Vec<Job>) -> Result<()> {
        let mut inner = self.write();

        if let Some(active) = inner
            .batches
            .values()
            .find(|b| b.configuration_id == batch.configuration_id && inner.batch_is_active(b))
        {
            return Err(ControlMapError::Conflict(format!(
                "batch {} for configuration {} is still in progress",
                active.id, batch.configuration_id
            )));
        }

        for job in jobs {
            inner.jobs.insert(job.id.clone(), job);
        }
        inner.batches.insert(batch.id.clone(), batch);
        Ok(())
    }

    pub fn batch(&self, batch_id: &str) -> Option<Batch> {
        self.read().batches.get(batch_id).cloned()
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.read().jobs.get(job_id).cloned()
    }

    /// The batch and its jobs in batch order, read under one lock.
    pub fn snapshot(&self, batch_id: &str) -> Option<(Batch, Vec<Job>)> {
        let inner = self.read();
        let batch = inner.batches.get(batch_id)?.clone();
        let jobs = batch
            .job_ids
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect();
        Some((batch, jobs))
    }

    pub fn is_batch_active(&self, batch_id: &str) -> bool {
        let inner = self.read();
        inner
            .batches
            .get(batch_id)
            .is_some_and(|batch| inner.batch_is_active(batch))
    }

    pub fn batch_count(&self) -> usize {
        self.read().batches.len()
    }

    pub fn job_count(&self) -> usize {
        self.read().jobs.len()
    }

    fn mutate_job(&self, job_id: &str, f: impl FnOnce(&mut Job) -> Result<()>) -> Result<Job> {
        let event_job = {
            let mut inner = self.write();
            let job = inner.job_mut(job_id)?;
            f(job)?;
            let updated = job.clone();
            if updated.status.is_terminal() {
                inner.close_batch_if_done(&updated.batch_id);
            }
            updated
        };

        self.progress.send(JobProgressEvent::from_job(&event_job));
        Ok(event_job)
    }

    /// `pending -> running`.
    pub fn start_job(&self, job_id: &str, message: &str) -> Result<Job> {
        self.mutate_job(job_id, |job| {
            transition(job, JobStatus::Running)?;
            job.started_at = Some(job.updated_at);
            job.progress_message = message.to_string();
            Ok(())
        })
    }

    /// Raises a running job's progress. Lower values than the current one
    /// only update the message, and values are capped below completion.
    pub fn update_progress(&self, job_id: &str, percentage: u8, message: &str) -> Result<Job> {
        self.mutate_job(job_id, |job| {
            if job.status != JobStatus::Running {
                return Err(ControlMapError::InvalidTransition {
                    job_id: job.id.clone(),
                    from: job.status.to_string(),
                    to: JobStatus::Running.to_string(),
                });
            }
            job.progress_percentage = job
                .progress_percentage
                .max(percentage.min(RUNNING_PROGRESS_CAP));
            job.progress_message = message.to_string();
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    /// `running -> completed`, recording the summary and artifacts.
    pub fn complete_job(
        &self,
        job_id: &str,
        summary: MappingSummary,
        artifacts: ArtifactRefs,
    ) -> Result<Job> {
        self.mutate_job(job_id, |job| {
            transition(job, JobStatus::Completed)?;
            job.progress_percentage = 100;
            job.progress_message = "Mapping completed successfully".to_string();
            job.summary = Some(summary);
            job.artifacts = Some(artifacts);
            job.completed_at = Some(job.updated_at);
            Ok(())
        })
    }

    /// `pending|running -> failed`. The percentage is left where it was.
    pub fn fail_job(&self, job_id: &str, error: &str) -> Result<Job> {
        self.mutate_job(job_id, |job| {
            transition(job, JobStatus::Failed)?;
            job.progress_message = "Job failed".to_string();
            job.error_message = Some(error.to_string());
            job.completed_at = Some(job.updated_at);
            Ok(())
        })
    }
}

impl Default for BatchStore {
    fn default() -> Self {
        Self::new(JobProgressBroadcaster::default())
    }
}
