use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::agent::{extract_json, AgentRequest, AgentRunner, PromptBuilder, PromptContext};
use crate::broadcast::BatchStore;
use crate::catalog::CheckCatalog;
use crate::error::AgentError;
use crate::mapping::{Exporter, MappingOutput, MappingSummary};
use crate::sanitize;
use crate::storage::FileStorage;
use crate::worker::job::{ArtifactRefs, JobStatus};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ProgressEstimator, ProgressTicker, AGENT_STARTED};

const BUILDING_PROMPT: u8 = 5;
const PROCESSING_OUTPUT: u8 = 70;
const GENERATING_FILES: u8 = 80;

/// Drives one job from `pending` to a terminal state.
///
/// Every failure is recorded on the job; nothing escapes to the batch.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<BatchStore>,
    agent: Arc<dyn AgentRunner>,
    prompts: Arc<dyn PromptBuilder>,
    catalog: Arc<dyn CheckCatalog>,
    exporter: Arc<dyn Exporter>,
    storage: Arc<FileStorage>,
}

struct Produced {
    summary: MappingSummary,
    artifacts: ArtifactRefs,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<BatchStore>,
        agent: Arc<dyn AgentRunner>,
        prompts: Arc<dyn PromptBuilder>,
        catalog: Arc<dyn CheckCatalog>,
        exporter: Arc<dyn Exporter>,
        storage: Arc<FileStorage>,
    ) -> Self {
        Self {
            config,
            store,
            agent,
            prompts,
            catalog,
            exporter,
            storage,
        }
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    /// Runs the job and returns its terminal status.
    pub async fn run(&self, ctx: &PipelineContext, cancel: CancellationToken) -> JobStatus {
        let span = info_span!("job",
            batch_id = %ctx.batch_id,
            job_id = %ctx.job_id,
            provider = %ctx.provider,
            upload = %sanitize::redact_path(&ctx.upload.stored_path),
        );

        async {
            if let Err(e) = self.store.start_job(&ctx.job_id, "Starting mapping process...") {
                warn!("Job could not start: {}", e);
                return self
                    .store
                    .job(&ctx.job_id)
                    .map(|j| j.status)
                    .unwrap_or(JobStatus::Failed);
            }

            match self.execute(ctx, cancel).await {
                Ok(produced) => self.finish(ctx, produced),
                Err(e) => {
                    let message = e.to_string();
                    warn!(error = %message, "Job failed");
                    if let Err(store_err) = self.store.fail_job(&ctx.job_id, &message) {
                        warn!("Failed to record job failure: {}", store_err);
                    }
                    JobStatus::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    fn milestone(&self, ctx: &PipelineContext, percentage: u8, message: &str) {
        if let Err(e) = self.store.update_progress(&ctx.job_id, percentage, message) {
            warn!("Failed to report progress: {}", e);
        }
    }

    async fn execute(
        &self,
        ctx: &PipelineContext,
        cancel: CancellationToken,
    ) -> Result<Produced, PipelineError> {
        let configuration = &ctx.configuration;

        // Step 1: Build prompt
        let prompt = {
            let _step = info_span!("build_prompt").entered();
            self.milestone(ctx, BUILDING_PROMPT, "Building prompt...");
            let checks = self.catalog.checks_for_prompt(&ctx.provider);
            self.prompts.build(&PromptContext {
                framework: &configuration.framework,
                provider: &ctx.provider,
                framework_content: &ctx.upload.extracted_text,
                checks_list: &checks,
                field_mappings: &configuration.field_mappings,
                custom_instructions: configuration.custom_instructions.as_deref(),
                enable_subgroup: configuration.enable_subgroup,
            })
        };

        // Step 2: Run agent
        let output = {
            self.milestone(
                ctx,
                AGENT_STARTED,
                &format!("Running agent for {}...", ctx.provider),
            );
            let _ticker = ProgressTicker::spawn(
                Arc::clone(&self.store),
                ctx.job_id.clone(),
                ProgressEstimator::new(self.config.agent_timeout),
                self.config.progress_tick,
            );

            let request = AgentRequest {
                system_prompt: Some(prompt.system),
                user_prompt: prompt.user,
                allowed_tools: self.config.allowed_tools.clone(),
                timeout: self.config.agent_timeout,
                cancel: cancel.clone(),
            };
            self.agent
                .run(request)
                .instrument(info_span!("run_agent"))
                .await?
        };
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled.into());
        }

        // Step 3: Parse output
        let mapping = {
            let _step = info_span!("parse_output").entered();
            self.milestone(ctx, PROCESSING_OUTPUT, "Processing output...");
            let stdout = output.into_stdout()?;
            let raw = extract_json(&stdout)?;
            MappingOutput::from_agent_object(
                raw,
                &ctx.provider,
                &configuration.framework,
                configuration.enable_subgroup,
            )?
        };

        // Step 4: Export
        let artifacts = {
            let _step = info_span!("export").entered();
            self.milestone(ctx, GENERATING_FILES, "Generating output files...");
            let json = self.exporter.to_json(&mapping)?;
            let excel = self.exporter.to_xlsx(&mapping)?;

            let framework = &configuration.framework.name;
            let files = vec![
                (sanitize::artifact_filename(framework, &ctx.provider, "json"), json),
                (sanitize::artifact_filename(framework, &ctx.provider, "xlsx"), excel),
            ];
            let written = self.storage.store_artifacts(&ctx.job_id, &files)?;
            into_refs(written).inspect_err(|_| self.storage.discard_artifacts(&ctx.job_id))?
        };

        Ok(Produced {
            summary: mapping.summary(),
            artifacts,
        })
    }

    fn finish(&self, ctx: &PipelineContext, produced: Produced) -> JobStatus {
        let summary = produced.summary;
        match self
            .store
            .complete_job(&ctx.job_id, summary, produced.artifacts)
        {
            Ok(_) => {
                info!(
                    total_controls = summary.total_controls,
                    total_check_mappings = summary.total_check_mappings,
                    "Job completed"
                );
                JobStatus::Completed
            }
            Err(e) => {
                warn!("Failed to record job completion: {}", e);
                self.storage.discard_artifacts(&ctx.job_id);
                self.store
                    .job(&ctx.job_id)
                    .map(|j| j.status)
                    .unwrap_or(JobStatus::Failed)
            }
        }
    }
}

/// Expects exactly the JSON file followed by the workbook.
fn into_refs(written: Vec<PathBuf>) -> Result<ArtifactRefs, PipelineError> {
    match <[PathBuf; 2]>::try_from(written) {
        Ok([json, excel]) => Ok(ArtifactRefs { json, excel }),
        Err(written) => Err(PipelineError::MissingArtifacts(written.len())),
    }
}
