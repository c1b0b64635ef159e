//! Read-only projections of batch and job state.
//!
//! Nothing here is stored: batch state is always derived from the jobs of
//! one consistent snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::provider_display_name;
use crate::mapping::MappingSummary;
use crate::worker::job::{ArtifactKind, Batch, Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLinks {
    pub json: String,
    pub excel: String,
}

impl DownloadLinks {
    pub fn for_job(job_id: &str) -> Self {
        Self {
            json: download_link(job_id, ArtifactKind::Json),
            excel: download_link(job_id, ArtifactKind::Excel),
        }
    }
}

pub fn download_link(job_id: &str, kind: ArtifactKind) -> String {
    format!("/download/{}/{}", job_id, kind.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub batch_id: String,
    pub provider: String,
    pub status: JobStatus,
    pub progress_percentage: u8,
    pub progress_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<MappingSummary>,
    pub download_links: Option<DownloadLinks>,
    pub error_message: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        let completed = job.status == JobStatus::Completed;
        Self {
            job_id: job.id.clone(),
            batch_id: job.batch_id.clone(),
            provider: job.provider.clone(),
            status: job.status,
            progress_percentage: job.progress_percentage,
            progress_message: job.progress_message.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            summary: if completed { job.summary } else { None },
            download_links: completed.then(|| DownloadLinks::for_job(&job.id)),
            error_message: if job.status == JobStatus::Failed {
                job.error_message.clone()
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub configuration_id: String,
    pub framework_name: String,
    pub status: BatchState,
    /// Completed with at least one failed job.
    pub partial: bool,
    pub overall_progress: u8,
    pub current_message: Option<String>,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Sum over completed jobs only.
    pub summary: MappingSummary,
    pub jobs: Vec<JobStatusView>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl BatchStatus {
    /// Projects one snapshot of a batch and its jobs, in batch order.
    pub fn project(batch: &Batch, jobs: &[Job]) -> Self {
        let completed_jobs = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count();
        let failed_jobs = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .count();
        let all_terminal = completed_jobs + failed_jobs == jobs.len();

        let overall_progress = if jobs.is_empty() {
            0
        } else {
            let total: usize = jobs
                .iter()
                .map(|j| {
                    if j.status.is_terminal() {
                        100
                    } else {
                        usize::from(j.progress_percentage)
                    }
                })
                .sum();
            (total / jobs.len()) as u8
        };

        let mut summary = MappingSummary::default();
        for job in jobs.iter().filter(|j| j.status == JobStatus::Completed) {
            if let Some(job_summary) = job.summary {
                summary += job_summary;
            }
        }

        let status = match (all_terminal, completed_jobs) {
            (false, _) => BatchState::Running,
            (true, 0) => BatchState::Failed,
            (true, _) => BatchState::Completed,
        };

        let error_message = (status == BatchState::Failed).then(|| {
            let reasons: Vec<String> = jobs
                .iter()
                .map(|j| {
                    format!(
                        "{}: {}",
                        j.provider,
                        j.error_message.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect();
            format!("all providers failed: {}", reasons.join("; "))
        });

        let current_message = match status {
            BatchState::Running => jobs
                .iter()
                .find(|j| j.status == JobStatus::Running)
                .map(|j| {
                    format!(
                        "Processing {}: {}",
                        provider_display_name(&j.provider),
                        j.progress_message
                    )
                })
                .or_else(|| Some("Waiting to start".to_string())),
            BatchState::Completed => Some(format!(
                "{} provider mapping{} generated",
                completed_jobs,
                if completed_jobs == 1 { "" } else { "s" }
            )),
            BatchState::Failed => None,
        };

        Self {
            batch_id: batch.id.clone(),
            configuration_id: batch.configuration_id.clone(),
            framework_name: batch.framework_name.clone(),
            status,
            partial: status == BatchState::Completed && failed_jobs > 0,
            overall_progress,
            current_message,
            completed_jobs,
            failed_jobs,
            summary,
            jobs: jobs.iter().map(JobStatusView::from).collect(),
            created_at: batch.created_at,
            completed_at: batch.completed_at,
            error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::job::ArtifactRefs;
    use std::path::PathBuf;

    fn batch(providers: &[&str]) -> (Batch, Vec<Job>) {
        let providers: Vec<String> = providers.iter().map(|p| p.to_string()).collect();
        Batch::with_jobs("cfg", "up", "CIS", &providers)
    }

    fn complete(job: &mut Job, controls: usize, mapped: usize, checks: usize) {
        job.status = JobStatus::Completed;
        job.progress_percentage = 100;
        job.summary = Some(MappingSummary {
            total_controls: controls,
            controls_with_checks: mapped,
            total_check_mappings: checks,
            unmapped_controls: controls - mapped,
        });
        job.artifacts = Some(ArtifactRefs {
            json: PathBuf::from("a.json"),
            excel: PathBuf::from("a.xlsx"),
        });
    }

    fn fail(job: &mut Job, error: &str) {
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
    }

    #[test]
    fn test_pending_batch_is_running() {
        let (batch, jobs) = batch(&["aws", "gcp"]);
        let status = BatchStatus::project(&batch, &jobs);

        assert_eq!(status.status, BatchState::Running);
        assert_eq!(status.overall_progress, 0);
        assert_eq!(status.current_message.as_deref(), Some("Waiting to start"));
        assert!(!status.partial);
    }

    #[test]
    fn test_overall_progress_counts_terminal_as_full() {
        let (batch, mut jobs) = batch(&["aws", "gcp", "azure"]);
        fail(&mut jobs[0], "boom");
        jobs[0].progress_percentage = 40;
        jobs[1].status = JobStatus::Running;
        jobs[1].progress_percentage = 50;
        jobs[1].progress_message = "Processing controls...".to_string();

        let status = BatchStatus::project(&batch, &jobs);
        assert_eq!(status.overall_progress, 50);
        assert_eq!(
            status.current_message.as_deref(),
            Some("Processing GCP: Processing controls...")
        );
    }

    #[test]
    fn test_partial_completion() {
        let (batch, mut jobs) = batch(&["aws", "gcp"]);
        complete(&mut jobs[0], 10, 7, 12);
        fail(&mut jobs[1], "execution timed out after 600 seconds");

        let status = BatchStatus::project(&batch, &jobs);
        assert_eq!(status.status, BatchState::Completed);
        assert!(status.partial);
        assert_eq!(status.completed_jobs, 1);
        assert_eq!(status.failed_jobs, 1);
        assert_eq!(status.summary.total_controls, 10);
        assert_eq!(status.summary.total_check_mappings, 12);
        assert_eq!(status.overall_progress, 100);
        assert_eq!(
            status.current_message.as_deref(),
            Some("1 provider mapping generated")
        );
        assert!(status.error_message.is_none());

        assert!(status.jobs[0].download_links.is_some());
        assert!(status.jobs[1].download_links.is_none());
        assert!(status.jobs[1].summary.is_none());
        assert!(status.jobs[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[test]
    fn test_all_failed() {
        let (batch, mut jobs) = batch(&["aws", "gcp"]);
        fail(&mut jobs[0], "agent failed: a");
        fail(&mut jobs[1], "agent failed: b");

        let status = BatchStatus::project(&batch, &jobs);
        assert_eq!(status.status, BatchState::Failed);
        assert!(!status.partial);
        assert_eq!(
            status.error_message.as_deref(),
            Some("all providers failed: aws: agent failed: a; gcp: agent failed: b")
        );
    }

    #[test]
    fn test_download_links() {
        assert_eq!(
            DownloadLinks::for_job("j1"),
            DownloadLinks {
                json: "/download/j1/json".to_string(),
                excel: "/download/j1/excel".to_string(),
            }
        );
    }
}
