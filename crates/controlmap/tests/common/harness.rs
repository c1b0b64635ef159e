//! Test harness for end-to-end service tests.
//!
//! Wires a [`MappingService`] to temporary storage, a static catalog and a
//! scripted agent so that batches run without spawning any process.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;

use controlmap::catalog::provider_display_name;
use controlmap::error::AgentError;
use controlmap::intake::{ConfigureResponse, UploadResponse};
use controlmap::{
    AgentOutput, AgentRequest, AgentRunner, Collaborators, MapRequest, MapResponse,
    MappingService, Settings,
};

use super::builders::{sample_catalog, ConfigureRequestBuilder};

/// What the scripted agent does for one provider.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit 0 with this stdout.
    Stdout(String),
    /// Exit 1 with this stderr.
    Fail(String),
    /// Report a timeout without waiting for it.
    Timeout,
    /// Block until the request is cancelled.
    Hang,
    /// Sleep, then behave like the inner reply.
    Delay(Duration, Box<Reply>),
}

/// One recorded agent invocation.
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub provider: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Agent runner that answers from a per-provider script.
///
/// The provider is read back from the "Provider Target" line of the prompt.
#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<AgentCall>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply for a provider key such as `aws`.
    pub fn reply(self, provider: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(provider_display_name(provider), reply);
        self
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }

    fn target(prompt: &str) -> String {
        prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("- Provider Target: "))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    async fn answer(reply: Reply, request: &AgentRequest) -> Result<AgentOutput, AgentError> {
        let mut reply = reply;
        loop {
            match reply {
                Reply::Stdout(stdout) => return Ok(AgentOutput::success(stdout)),
                Reply::Fail(stderr) => {
                    return Ok(AgentOutput {
                        stdout: String::new(),
                        stderr,
                        exit_code: 1,
                    })
                }
                Reply::Timeout => return Err(AgentError::Timeout(request.timeout.as_secs())),
                Reply::Hang => {
                    request.cancel.cancelled().await;
                    return Err(AgentError::Cancelled);
                }
                Reply::Delay(wait, inner) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = request.cancel.cancelled() => return Err(AgentError::Cancelled),
                    }
                    reply = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let provider = Self::target(&request.user_prompt);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| Reply::Fail(format!("no reply scripted for {}", provider)));

        let started = Instant::now();
        let result = Self::answer(reply, &request).await;
        self.calls.lock().unwrap().push(AgentCall {
            provider,
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// A service over temporary directories and a scripted agent.
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub service: MappingService,
    pub agent: Arc<ScriptedAgent>,
}

impl TestHarness {
    pub fn new(agent: ScriptedAgent) -> Self {
        Self::with_settings(agent, |_| {})
    }

    /// Like [`TestHarness::new`], with a last chance to adjust the settings.
    pub fn with_settings(agent: ScriptedAgent, adjust: impl FnOnce(&mut Settings)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut settings = Settings::default();
        settings.storage.root = temp_dir.path().join("data");
        settings.providers_dir = temp_dir.path().join("providers");
        settings.agent.timeout_secs = 600;
        settings.progress.tick_ms = 50;
        adjust(&mut settings);

        let agent = Arc::new(agent);
        let collaborators = Collaborators::new(
            Arc::new(sample_catalog()),
            Arc::clone(&agent) as Arc<dyn AgentRunner>,
        );

        Self {
            service: MappingService::new(settings, collaborators),
            temp_dir,
            agent,
        }
    }

    /// Uploads a small text framework document.
    pub fn upload(&self) -> UploadResponse {
        self.service
            .upload(
                "framework.txt",
                b"1.1 Ensure MFA is enabled for the root account\n1.2 Encrypt storage at rest\n",
            )
            .expect("upload")
    }

    pub fn configure(&self, upload_id: &str, providers: &[&str]) -> ConfigureResponse {
        self.service
            .configure(
                ConfigureRequestBuilder::new(upload_id)
                    .providers(providers)
                    .build(),
            )
            .expect("configure")
    }

    /// Uploads, configures and starts a batch for the providers.
    pub fn start(&self, providers: &[&str]) -> MapResponse {
        let upload = self.upload();
        let configuration = self.configure(&upload.upload_id, providers);
        self.service
            .start_batch(&MapRequest {
                upload_id: upload.upload_id,
                configuration_id: configuration.configuration_id,
            })
            .expect("start batch")
    }

    pub fn output_dir(&self) -> std::path::PathBuf {
        self.service.settings().storage.output_dir()
    }
}
