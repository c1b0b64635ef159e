use std::sync::Arc;

use crate::intake::{Configuration, Upload};

/// Everything one job run reads. Inputs are shared with the rest of the
/// batch and never written.
#[derive(Clone)]
pub struct PipelineContext {
    pub batch_id: String,
    pub job_id: String,
    pub provider: String,
    pub configuration: Arc<Configuration>,
    pub upload: Arc<Upload>,
}

impl PipelineContext {
    pub fn new(
        batch_id: &str,
        job_id: &str,
        provider: &str,
        configuration: Arc<Configuration>,
        upload: Arc<Upload>,
    ) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            job_id: job_id.to_string(),
            provider: provider.to_string(),
            configuration,
            upload,
        }
    }
}
