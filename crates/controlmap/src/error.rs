use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlMapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },
}

impl ControlMapError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),

    #[error("PDF processing failed: {0}")]
    PdfProcessing(String),

    #[error("Spreadsheet processing failed: {0}")]
    SpreadsheetProcessing(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Failed to encode artifact: {0}")]
    Encode(String),
}

/// Rejections raised before any batch or job is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one provider must be selected")]
    NoProviders,

    #[error("Provider '{provider}' not found. Available: {available}")]
    UnknownProvider { provider: String, available: String },

    #[error("Provider '{0}' selected more than once")]
    DuplicateProvider(String),

    #[error("Framework name must not be empty")]
    EmptyFrameworkName,

    #[error("Configuration does not match upload")]
    UploadMismatch,

    #[error("Unsupported file type: {extension}. Allowed: {allowed}")]
    UnsupportedFileType { extension: String, allowed: String },

    #[error("File too large. Maximum size: {max_bytes} bytes")]
    FileTooLarge { max_bytes: u64 },

    #[error("Empty file uploaded")]
    EmptyFile,

    #[error("No filename provided")]
    MissingFilename,

    #[error("Invalid file type '{0}'. Use 'json' or 'excel'")]
    InvalidArtifactKind(String),
}

/// Failures of a single agent invocation. All of them are job-local.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("cancelled by user")]
    Cancelled,

    #[error("failed to start agent: {0}")]
    Spawn(String),

    #[error("agent failed: {0}")]
    Execution(String),

    #[error("invalid agent output: {0}")]
    Output(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("No completed jobs found in this batch")]
    NoCompletedJobs,

    #[error("Batch {0} is still running")]
    BatchRunning(String),

    #[error("Failed to write archive entry '{name}': {message}")]
    WriteEntry { name: String, message: String },

    #[error("Artifact for job {job_id} is missing on disk: {path}")]
    MissingArtifact { job_id: String, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ControlMapError>;
