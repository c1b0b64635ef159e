//! Library facade over intake, orchestration and artifact retrieval.
//!
//! The HTTP server is a thin layer over [`MappingService`]; everything it
//! exposes is reachable here without a network.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, info_span, warn};

use crate::agent::{AgentRunner, CliAgentRunner, PromptBuilder, TemplatePromptBuilder};
use crate::broadcast::{BatchStore, JobProgressBroadcaster, JobProgressEvent};
use crate::catalog::{CheckCatalog, CheckPage, CheckQuery, DirectoryCatalog, ProviderInfo};
use crate::config::Settings;
use crate::error::{ControlMapError, Result, ValidationError};
use crate::intake::{
    validate_configure_request, validate_upload, ConfigureRequest, ConfigureResponse,
    Configuration, IntakeStore, Upload, UploadResponse,
};
use crate::mapping::{Exporter, WorkbookExporter};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::processor::{ProcessorRegistry, TextExtractor};
use crate::sanitize;
use crate::storage::{build_archive, BatchArchive, FileStorage};
use crate::worker::{ArtifactKind, BatchStatus, JobStatus, JobStatusView, Orchestrator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRequest {
    pub upload_id: String,
    pub configuration_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: String,
    pub provider: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResponse {
    pub batch_id: String,
    pub job_ids: Vec<String>,
    pub jobs: Vec<JobInfo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub providers: usize,
    pub uploads: usize,
    pub batches: usize,
    /// Batches whose background task is still running.
    pub active_batches: usize,
}

/// The swappable parts of the service.
pub struct Collaborators {
    pub catalog: Arc<dyn CheckCatalog>,
    pub agent: Arc<dyn AgentRunner>,
    pub extractor: Arc<dyn TextExtractor>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub exporter: Arc<dyn Exporter>,
}

impl Collaborators {
    /// Default extraction, prompts and export around the given catalog and
    /// agent.
    pub fn new(catalog: Arc<dyn CheckCatalog>, agent: Arc<dyn AgentRunner>) -> Self {
        Self {
            catalog,
            agent,
            extractor: Arc::new(ProcessorRegistry::new()),
            prompts: Arc::new(TemplatePromptBuilder::new()),
            exporter: Arc::new(WorkbookExporter::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let catalog = Arc::new(DirectoryCatalog::new(&settings.providers_dir));
        let agent = Arc::new(CliAgentRunner::from_settings(
            &settings.agent,
            settings.providers_dir.clone(),
        ));
        Self::new(catalog, agent)
    }
}

pub struct MappingService {
    settings: Arc<Settings>,
    intake: Arc<IntakeStore>,
    catalog: Arc<dyn CheckCatalog>,
    extractor: Arc<dyn TextExtractor>,
    storage: Arc<FileStorage>,
    orchestrator: Orchestrator,
}

impl MappingService {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let settings = Arc::new(settings);
        let storage = Arc::new(FileStorage::new(
            settings.storage.upload_dir(),
            settings.storage.output_dir(),
        ));
        let intake = Arc::new(IntakeStore::new());
        let store = Arc::new(BatchStore::new(JobProgressBroadcaster::default()));

        let pipeline = Arc::new(Pipeline::new(
            PipelineConfig::from_settings(&settings),
            store,
            collaborators.agent,
            collaborators.prompts,
            Arc::clone(&collaborators.catalog),
            collaborators.exporter,
            Arc::clone(&storage),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&intake),
            pipeline,
            settings.execution.global_slot,
        );

        Self {
            settings,
            intake,
            catalog: collaborators.catalog,
            extractor: collaborators.extractor,
            storage,
            orchestrator,
        }
    }

    pub fn from_settings(settings: Settings) -> Self {
        let collaborators = Collaborators::from_settings(&settings);
        Self::new(settings, collaborators)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Validates, stores and extracts an uploaded framework document.
    ///
    /// The stored file is removed again when its text cannot be extracted.
    pub fn upload(&self, filename: &str, content: &[u8]) -> Result<UploadResponse> {
        let extension = validate_upload(filename, content.len() as u64, &self.settings.limits)?;
        let upload_id = uuid::Uuid::new_v4().to_string();
        let _span = info_span!("upload", upload_id = %upload_id, extension = %extension).entered();

        let stored_path = self.storage.store_upload(&upload_id, &extension, content)?;
        let document = match self.extractor.extract(&stored_path) {
            Ok(document) => document,
            Err(e) => {
                warn!("Text extraction failed: {}", e);
                self.storage.discard_upload(&stored_path);
                return Err(e.into());
            }
        };

        let upload = Upload {
            id: upload_id,
            filename: filename.to_string(),
            file_type: document.format,
            size_bytes: content.len() as u64,
            content_type: mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string(),
            preview: document.preview(),
            extracted_text: document.text,
            stored_path,
            created_at: Utc::now(),
        };
        let upload = self.intake.insert_upload(upload);

        info!(
            file = %sanitize::redact_path(&upload.stored_path),
            size_bytes = upload.size_bytes,
            text_chars = upload.extracted_text.chars().count(),
            "Stored upload"
        );
        Ok(UploadResponse::from(upload.as_ref()))
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.catalog.list_providers()
    }

    pub fn list_checks(&self, provider: &str, query: &CheckQuery) -> Result<CheckPage> {
        if !self.catalog.provider_exists(provider) {
            return Err(ControlMapError::not_found("Provider", provider));
        }
        Ok(self.catalog.checks(provider, query))
    }

    pub fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse> {
        if self.intake.upload(&request.upload_id).is_none() {
            return Err(ControlMapError::not_found("Upload", &request.upload_id));
        }
        let providers = validate_configure_request(&request, self.catalog.as_ref())?;

        let configuration = self
            .intake
            .insert_configuration(Configuration::from_request(request));
        let total_checks = providers.iter().map(|p| p.check_count).sum();

        info!(
            configuration_id = %configuration.id,
            framework = %configuration.framework.name,
            providers = configuration.providers.len(),
            total_checks,
            "Created configuration"
        );
        Ok(ConfigureResponse {
            configuration_id: configuration.id.clone(),
            providers,
            total_checks,
        })
    }

    /// Creates a batch for the configuration and starts it in the background.
    pub fn start_batch(&self, request: &MapRequest) -> Result<MapResponse> {
        let configuration = self
            .intake
            .configuration(&request.configuration_id)
            .ok_or_else(|| ControlMapError::not_found("Configuration", &request.configuration_id))?;
        if configuration.upload_id != request.upload_id {
            return Err(ValidationError::UploadMismatch.into());
        }
        if self.intake.upload(&request.upload_id).is_none() {
            return Err(ControlMapError::not_found("Upload", &request.upload_id));
        }

        let batch = self.orchestrator.create_batch(&configuration.id)?;
        let jobs = self
            .orchestrator
            .status(&batch.id)?
            .jobs
            .into_iter()
            .map(|j| JobInfo {
                job_id: j.job_id,
                provider: j.provider,
                status: j.status,
            })
            .collect();
        self.orchestrator.run(&batch.id)?;

        Ok(MapResponse {
            batch_id: batch.id,
            job_ids: batch.job_ids,
            jobs,
            created_at: batch.created_at,
        })
    }

    pub fn batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        self.orchestrator.status(batch_id)
    }

    pub fn job_status(&self, job_id: &str) -> Result<JobStatusView> {
        self.orchestrator
            .store()
            .job(job_id)
            .map(|job| JobStatusView::from(&job))
            .ok_or_else(|| ControlMapError::not_found("Job", job_id))
    }

    /// Reads one output of a completed job. `kind` is `json` or `excel`.
    pub fn artifact(&self, job_id: &str, kind: &str) -> Result<Artifact> {
        let kind: ArtifactKind = kind.parse()?;
        let job = self
            .orchestrator
            .store()
            .job(job_id)
            .ok_or_else(|| ControlMapError::not_found("Job", job_id))?;
        let path = job
            .artifact(kind)
            .ok_or_else(|| ControlMapError::not_found("Artifact", job_id))?;

        let filename = sanitize::redact_path(path);
        let bytes = self.storage.read(path)?;
        Ok(Artifact {
            filename,
            content_type: kind.content_type(),
            bytes,
        })
    }

    pub fn archive(&self, batch_id: &str) -> Result<BatchArchive> {
        let (batch, jobs) = self
            .orchestrator
            .store()
            .snapshot(batch_id)
            .ok_or_else(|| ControlMapError::not_found("Batch", batch_id))?;
        build_archive(&batch, &jobs, &self.storage)
    }

    pub fn cancel(&self, batch_id: &str) -> Result<BatchStatus> {
        self.orchestrator.cancel_batch(batch_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.orchestrator.store().broadcaster().subscribe()
    }

    /// Waits until a started batch has no more work.
    pub async fn wait_for_batch(&self, batch_id: &str) {
        self.orchestrator.join(batch_id).await;
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            providers: self.catalog.list_providers().len(),
            uploads: self.intake.upload_count(),
            batches: self.orchestrator.store().batch_count(),
            active_batches: self.orchestrator.running_batches(),
        }
    }
}
