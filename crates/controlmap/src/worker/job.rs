use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::MappingSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `pending -> running -> completed|failed`. A pending job may also fail
    /// directly when its batch is cancelled before it starts.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk location of a completed job's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRefs {
    pub json: PathBuf,
    pub excel: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Json,
    Excel,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Json => "json",
            ArtifactKind::Excel => "excel",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Json => "application/json",
            ArtifactKind::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ArtifactKind::Json),
            "excel" => Ok(ArtifactKind::Excel),
            other => Err(crate::error::ValidationError::InvalidArtifactKind(
                other.to_string(),
            )),
        }
    }
}

/// One provider's unit of work inside a batch.
///
/// Only the runner driving the job writes to it, through [`BatchStore`].
///
/// [`BatchStore`]: crate::broadcast::BatchStore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub batch_id: String,
    pub provider: String,
    pub status: JobStatus,
    pub progress_percentage: u8,
    pub progress_message: String,
    pub error_message: Option<String>,
    pub summary: Option<MappingSummary>,
    pub artifacts: Option<ArtifactRefs>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn pending(batch_id: &str, provider: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            provider: provider.to_string(),
            status: JobStatus::Pending,
            progress_percentage: 0,
            progress_message: "Waiting to start".to_string(),
            error_message: None,
            summary: None,
            artifacts: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&PathBuf> {
        if self.status != JobStatus::Completed {
            return None;
        }
        self.artifacts.as_ref().map(|a| match kind {
            ArtifactKind::Json => &a.json,
            ArtifactKind::Excel => &a.excel,
        })
    }
}

/// A run of one configuration over all of its providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub configuration_id: String,
    pub upload_id: String,
    pub framework_name: String,
    /// Same order as the configuration's providers.
    pub job_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Creates the batch together with one pending job per provider.
    pub fn with_jobs(
        configuration_id: &str,
        upload_id: &str,
        framework_name: &str,
        providers: &[String],
    ) -> (Self, Vec<Job>) {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let jobs: Vec<Job> = providers
            .iter()
            .map(|provider| Job::pending(&id, provider, now))
            .collect();

        let batch = Self {
            id,
            configuration_id: configuration_id.to_string(),
            upload_id: upload_id.to_string(),
            framework_name: framework_name.to_string(),
            job_ids: jobs.iter().map(|j| j.id.clone()).collect(),
            created_at: now,
            completed_at: None,
        };
        (batch, jobs)
    }
}
