use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the mapping service.
///
/// Every section has serde defaults so an empty `{"version": "1.0"}` document
/// (or `Settings::default()`) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default = "default_providers_dir")]
    pub providers_dir: PathBuf,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub progress: ProgressSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_providers_dir() -> PathBuf {
    PathBuf::from("providers")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageSettings::default(),
            providers_dir: default_providers_dir(),
            agent: AgentSettings::default(),
            progress: ProgressSettings::default(),
            execution: ExecutionSettings::default(),
            limits: LimitSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads: String,
    #[serde(default = "default_outputs_dir")]
    pub outputs: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_outputs_dir() -> String {
    "outputs".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            uploads: default_uploads_dir(),
            outputs: default_outputs_dir(),
        }
    }
}

impl StorageSettings {
    pub fn upload_dir(&self) -> PathBuf {
        self.root.join(&self.uploads)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.outputs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_command")]
    pub command: String,
    /// Extra arguments placed before the built-in flags.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Working directory for the agent process. Defaults to `providers_dir`
    /// so the read-only tools can browse check definitions.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_allowed_tools() -> Vec<String> {
    vec!["Read".to_string(), "Glob".to_string()]
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: Vec::new(),
            allowed_tools: default_allowed_tools(),
            timeout_secs: default_timeout_secs(),
            working_dir: None,
        }
    }
}

impl AgentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSettings {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 {
    3_000
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl ProgressSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Serialize agent processes across all batches.
    #[serde(default = "default_true")]
    pub global_slot: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self { global_slot: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    [".pdf", ".csv", ".xlsx", ".xls", ".json", ".txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl LimitSettings {
    pub fn allows_extension(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
