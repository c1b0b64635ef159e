use thiserror::Error;

/// Why a job failed. The display text becomes the job's error message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Agent(#[from] crate::error::AgentError),

    #[error("Failed to write output files: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Expected a JSON and an Excel output, got {0} files")]
    MissingArtifacts(usize),
}
