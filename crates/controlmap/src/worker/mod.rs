pub mod job;
pub mod orchestrator;
pub mod status;

pub use job::{ArtifactKind, ArtifactRefs, Batch, Job, JobStatus};
pub use orchestrator::Orchestrator;
pub use status::{BatchState, BatchStatus, DownloadLinks, JobStatusView};
