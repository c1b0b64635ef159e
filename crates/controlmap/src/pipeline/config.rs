use std::time::Duration;

use crate::config::Settings;

/// Per-job execution parameters taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub agent_timeout: Duration,
    pub progress_tick: Duration,
    pub allowed_tools: Vec<String>,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            agent_timeout: settings.agent.timeout(),
            progress_tick: settings.progress.tick(),
            allowed_tools: settings.agent.allowed_tools.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
