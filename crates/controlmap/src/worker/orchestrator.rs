use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::broadcast::BatchStore;
use crate::error::{ControlMapError, Result, ValidationError};
use crate::intake::IntakeStore;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::worker::job::{Batch, JobStatus};
use crate::worker::status::BatchStatus;

const CANCELLED_BEFORE_START: &str = "cancelled before start";

struct RunningBatch {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

type Batches = HashMap<String, RunningBatch>;
type Registry = Arc<Mutex<Batches>>;

fn lock(registry: &Mutex<Batches>) -> MutexGuard<'_, Batches> {
    match registry.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("Batch registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Drops a batch's registry entry when its task ends, however it ends.
struct Deregister {
    registry: Registry,
    batch_id: String,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.batch_id);
    }
}

/// Owns batch execution: one background task per batch, jobs run strictly
/// in provider order.
///
/// An optional single-permit semaphore is shared by every batch so that at
/// most one agent process runs at any time. A batch stays in the registry
/// only while its task is alive.
pub struct Orchestrator {
    intake: Arc<IntakeStore>,
    pipeline: Arc<Pipeline>,
    slot: Option<Arc<Semaphore>>,
    running: Registry,
}

impl Orchestrator {
    pub fn new(intake: Arc<IntakeStore>, pipeline: Arc<Pipeline>, global_slot: bool) -> Self {
        Self {
            intake,
            pipeline,
            slot: global_slot.then(|| Arc::new(Semaphore::new(1))),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        self.pipeline.store()
    }

    fn running(&self) -> MutexGuard<'_, Batches> {
        lock(&self.running)
    }

    /// Number of batches whose background task is still alive.
    pub fn running_batches(&self) -> usize {
        self.running().len()
    }

    /// Creates a batch with one pending job per configured provider.
    /// Nothing runs until [`Orchestrator::run`] is called.
    pub fn create_batch(&self, configuration_id: &str) -> Result<Batch> {
        let configuration = self
            .intake
            .configuration(configuration_id)
            .ok_or_else(|| ControlMapError::not_found("Configuration", configuration_id))?;
        if configuration.providers.is_empty() {
            return Err(ValidationError::NoProviders.into());
        }

        let (batch, jobs) = Batch::with_jobs(
            &configuration.id,
            &configuration.upload_id,
            &configuration.framework.name,
            &configuration.providers,
        );
        self.store().insert_batch(batch.clone(), jobs)?;

        info!(
            batch_id = %batch.id,
            configuration_id = %configuration.id,
            jobs = batch.job_ids.len(),
            "Created batch"
        );
        Ok(batch)
    }

    /// Starts the batch in the background and returns immediately.
    pub fn run(&self, batch_id: &str) -> Result<()> {
        let batch = self
            .store()
            .batch(batch_id)
            .ok_or_else(|| ControlMapError::not_found("Batch", batch_id))?;
        let configuration = self
            .intake
            .configuration(&batch.configuration_id)
            .ok_or_else(|| ControlMapError::not_found("Configuration", &batch.configuration_id))?;
        let upload = self
            .intake
            .upload(&batch.upload_id)
            .ok_or_else(|| ControlMapError::not_found("Upload", &batch.upload_id))?;

        let mut running = self.running();
        if running.contains_key(batch_id) {
            return Err(ControlMapError::Conflict(format!(
                "batch {} has already been started",
                batch_id
            )));
        }
        if !self.store().is_batch_active(batch_id) {
            return Err(ControlMapError::Conflict(format!(
                "batch {} has already finished",
                batch_id
            )));
        }

        let cancel = CancellationToken::new();
        let pipeline = Arc::clone(&self.pipeline);
        let slot = self.slot.clone();
        let task_cancel = cancel.clone();
        let span = info_span!("batch", batch_id = %batch.id);
        let deregister = Deregister {
            registry: Arc::clone(&self.running),
            batch_id: batch_id.to_string(),
        };

        // The registry lock is held until the entry is inserted, so the task
        // cannot deregister before it is registered.
        let handle = tokio::spawn(
            async move {
                let _deregister = deregister;
                for (position, job_id) in batch.job_ids.iter().enumerate() {
                    let Some(job) = pipeline.store().job(job_id) else {
                        continue;
                    };
                    if job.status != JobStatus::Pending {
                        continue;
                    }
                    if task_cancel.is_cancelled() {
                        cancel_pending(pipeline.store(), job_id);
                        continue;
                    }

                    // Held until the job is terminal.
                    let _permit = match &slot {
                        Some(slot) => {
                            let permit = tokio::select! {
                                permit = Arc::clone(slot).acquire_owned() => permit.ok(),
                                _ = task_cancel.cancelled() => None,
                            };
                            if permit.is_none() {
                                cancel_pending(pipeline.store(), job_id);
                                continue;
                            }
                            permit
                        }
                        None => None,
                    };

                    let ctx = PipelineContext::new(
                        &batch.id,
                        job_id,
                        &job.provider,
                        Arc::clone(&configuration),
                        Arc::clone(&upload),
                    );
                    let status = pipeline.run(&ctx, task_cancel.child_token()).await;
                    info!(
                        position = position + 1,
                        total = batch.job_ids.len(),
                        provider = %job.provider,
                        status = %status,
                        "Job finished"
                    );
                }
                info!("Batch finished");
            }
            .instrument(span),
        );

        running.insert(batch_id.to_string(), RunningBatch { handle, cancel });
        Ok(())
    }

    /// Cancels a batch. The running job fails with "cancelled by user" once
    /// its agent is killed, and jobs that never started fail as cancelled
    /// before start.
    pub fn cancel_batch(&self, batch_id: &str) -> Result<BatchStatus> {
        if self.store().batch(batch_id).is_none() {
            return Err(ControlMapError::not_found("Batch", batch_id));
        }
        if !self.store().is_batch_active(batch_id) {
            return Err(ControlMapError::Conflict(format!(
                "batch {} has already finished",
                batch_id
            )));
        }

        let started = match self.running().get(batch_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        };

        // Never started: no task owns the jobs, so fail them here.
        if !started {
            if let Some((batch, _)) = self.store().snapshot(batch_id) {
                for job_id in &batch.job_ids {
                    cancel_pending(self.store(), job_id);
                }
            }
        }

        warn!(batch_id, "Batch cancelled");
        self.status(batch_id)
    }

    pub fn status(&self, batch_id: &str) -> Result<BatchStatus> {
        let (batch, jobs) = self
            .store()
            .snapshot(batch_id)
            .ok_or_else(|| ControlMapError::not_found("Batch", batch_id))?;
        Ok(BatchStatus::project(&batch, &jobs))
    }

    /// Waits for a started batch's task to finish.
    pub async fn join(&self, batch_id: &str) {
        let entry = self.running().remove(batch_id);
        if let Some(entry) = entry {
            if let Err(e) = entry.handle.await {
                warn!(batch_id, "Batch task ended abnormally: {}", e);
            }
        }
    }

    /// Cancels every running batch and waits for their tasks.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, RunningBatch)> = self.running().drain().collect();
        for (batch_id, entry) in entries {
            entry.cancel.cancel();
            if let Err(e) = entry.handle.await {
                warn!(batch_id = %batch_id, "Batch task ended abnormally: {}", e);
            }
        }
    }
}

fn cancel_pending(store: &BatchStore, job_id: &str) {
    if store.job(job_id).map(|j| j.status) == Some(JobStatus::Pending) {
        if let Err(e) = store.fail_job(job_id, CANCELLED_BEFORE_START) {
            warn!(job_id, "Failed to cancel pending job: {}", e);
        }
    }
}
