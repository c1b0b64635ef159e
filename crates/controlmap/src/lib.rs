pub mod agent;
pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod intake;
pub mod mapping;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod worker;

pub use agent::{AgentOutput, AgentRequest, AgentRunner, CliAgentRunner, PromptBuilder};
pub use broadcast::{BatchStore, JobProgressBroadcaster, JobProgressEvent};
pub use catalog::{CheckCatalog, DirectoryCatalog, StaticCatalog};
pub use config::{load_settings, load_settings_from_env, Settings};
pub use error::{
    AgentError, ArchiveError, ConfigError, ControlMapError, ProcessError, Result, StorageError,
    ValidationError,
};
pub use mapping::{Exporter, MappingOutput, MappingSummary};
pub use service::{Collaborators, MapRequest, MapResponse, MappingService};
pub use worker::{BatchState, BatchStatus, JobStatus, JobStatusView, Orchestrator};
