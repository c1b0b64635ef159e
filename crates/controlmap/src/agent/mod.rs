//! The external, read-only mapping agent.
//!
//! An [`AgentRunner`] executes one prompt and hands back raw process output.
//! Interpreting that output is left to [`output::extract_json`] so runners
//! stay trivial to fake in tests.

pub mod cli;
pub mod output;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

pub use cli::CliAgentRunner;
pub use output::extract_json;
pub use prompt::{Prompt, PromptBuilder, PromptContext, TemplatePromptBuilder};

/// Bytes of stdout quoted in a failure message when stderr is empty.
const STDOUT_EXCERPT: usize = 500;
/// Trailing bytes of stderr kept in a failure message.
const STDERR_EXCERPT: usize = 2048;

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub system_prompt: Option<String>,
    /// Sent on stdin.
    pub user_prompt: String,
    pub allowed_tools: Vec<String>,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl AgentOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Returns stdout for a zero exit code, otherwise an execution error
    /// quoting the tail of stderr (or the start of stdout when stderr is empty).
    pub fn into_stdout(self) -> Result<String, AgentError> {
        if self.exit_code == 0 {
            return Ok(self.stdout);
        }

        let detail = if !self.stderr.trim().is_empty() {
            tail(self.stderr.trim(), STDERR_EXCERPT).to_string()
        } else if !self.stdout.trim().is_empty() {
            self.stdout.chars().take(STDOUT_EXCERPT).collect()
        } else {
            format!("exit code {}", self.exit_code)
        };

        Err(AgentError::Execution(detail))
    }
}

/// The last `max` bytes of `text`, moved forward to a char boundary.
fn tail(text: &str, max: usize) -> &str {
    let mut start = text.len().saturating_sub(max);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutput, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_exit_returns_stdout() {
        assert_eq!(AgentOutput::success("{}").into_stdout().unwrap(), "{}");
    }

    #[test]
    fn test_nonzero_exit_prefers_stderr() {
        let output = AgentOutput {
            stdout: "partial".to_string(),
            stderr: "  rate limited\n".to_string(),
            exit_code: 1,
        };
        assert_eq!(
            output.into_stdout(),
            Err(AgentError::Execution("rate limited".to_string()))
        );
    }

    #[test]
    fn test_long_stderr_keeps_its_tail() {
        let stderr = format!("{}é{}Error: quota exceeded", "z".repeat(5000), "b".repeat(2026));
        let output = AgentOutput {
            stdout: String::new(),
            stderr,
            exit_code: 1,
        };
        match output.into_stdout() {
            Err(AgentError::Execution(detail)) => {
                // The cut lands inside 'é' and moves past it.
                assert_eq!(detail.len(), STDERR_EXCERPT - 1);
                assert!(detail.starts_with('b'));
                assert!(detail.ends_with("Error: quota exceeded"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("héllo", 4), "llo");
        assert_eq!(tail("short", 100), "short");
    }

    #[test]
    fn test_nonzero_exit_quotes_stdout_excerpt() {
        let output = AgentOutput {
            stdout: "x".repeat(900),
            stderr: String::new(),
            exit_code: 2,
        };
        match output.into_stdout() {
            Err(AgentError::Execution(detail)) => assert_eq!(detail.len(), STDOUT_EXCERPT),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_exit_without_output() {
        let output = AgentOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 137,
        };
        assert_eq!(
            output.into_stdout().unwrap_err().to_string(),
            "agent failed: exit code 137"
        );
    }
}
