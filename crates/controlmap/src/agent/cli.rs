use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::agent::{AgentOutput, AgentRequest, AgentRunner};
use crate::config::AgentSettings;
use crate::error::AgentError;

/// Runs the agent CLI as a child process.
///
/// The command line is
/// `<command> <args..> --print --output-format json --allowedTools <tools> [--system-prompt <s>]`
/// with the user prompt written to stdin. The child runs in its own process
/// group so timeouts and cancellation can take down anything it spawned.
pub struct CliAgentRunner {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CliAgentRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn from_settings(settings: &AgentSettings, default_working_dir: PathBuf) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            working_dir: Some(
                settings
                    .working_dir
                    .clone()
                    .unwrap_or(default_working_dir),
            ),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub(crate) fn build_args(&self, request: &AgentRequest) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(["--print", "--output-format", "json"].map(String::from));

        if !request.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(request.allowed_tools.join(","));
        }

        if let Some(system_prompt) = request.system_prompt.as_ref().filter(|s| !s.is_empty()) {
            args.push("--system-prompt".to_string());
            args.push(system_prompt.clone());
        }

        args
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: killpg only sends a signal; the group id is the child's pid
        // because it was spawned with process_group(0).
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(pid, "killpg failed: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[async_trait]
impl AgentRunner for CliAgentRunner {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let args = self.build_args(&request);
        let timeout_secs = request.timeout.as_secs();

        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        info!(
            command = %self.command,
            timeout_secs,
            prompt_chars = request.user_prompt.len(),
            "Starting agent process"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentError::Spawn(format!(
                    "'{}' not found, ensure the agent CLI is installed and in PATH",
                    self.command
                ))
            } else {
                AgentError::Spawn(e.to_string())
            }
        })?;
        let pid = child.id();

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.user_prompt.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!("Agent closed stdin early: {}", e);
                }
            });
        }

        let output = tokio::select! {
            result = tokio::time::timeout(request.timeout, child.wait_with_output()) => match result {
                Ok(output) => output.map_err(|e| AgentError::Execution(format!("failed to collect agent output: {}", e)))?,
                Err(_) => {
                    warn!(timeout_secs, "Agent timed out, killing process group");
                    kill_process_group(pid);
                    return Err(AgentError::Timeout(timeout_secs));
                }
            },
            _ = request.cancel.cancelled() => {
                warn!("Agent cancelled, killing process group");
                kill_process_group(pid);
                return Err(AgentError::Cancelled);
            }
        };

        // Killed processes have no exit code.
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Agent process finished"
        );

        Ok(AgentOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    fn request(timeout: Duration) -> AgentRequest {
        AgentRequest {
            system_prompt: Some("be terse".to_string()),
            user_prompt: "map the controls".to_string(),
            allowed_tools: vec!["Read".to_string(), "Glob".to_string()],
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_build_args() {
        let runner = CliAgentRunner::new("claude").with_args(vec!["--verbose".to_string()]);
        let args = runner.build_args(&request(Duration::from_secs(1)));

        assert_eq!(
            args,
            vec![
                "--verbose",
                "--print",
                "--output-format",
                "json",
                "--allowedTools",
                "Read,Glob",
                "--system-prompt",
                "be terse",
            ]
        );
    }

    #[test]
    fn test_build_args_without_system_prompt() {
        let runner = CliAgentRunner::new("claude");
        let mut req = request(Duration::from_secs(1));
        req.system_prompt = None;
        req.allowed_tools.clear();

        assert_eq!(
            runner.build_args(&req),
            vec!["--print", "--output-format", "json"]
        );
    }

    /// `sh -c <body>`: the agent flags that follow become `$0..$n` and are
    /// ignored by the script.
    fn script(body: &str) -> CliAgentRunner {
        CliAgentRunner::new("sh").with_args(vec!["-c".to_string(), body.to_string()])
    }

    #[tokio::test]
    async fn test_prompt_is_sent_on_stdin() {
        let runner = script("cat");
        let output = runner.run(request(Duration::from_secs(5))).await.unwrap();

        assert_eq!(output.stdout, "map the controls");
        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let runner = script("echo boom >&2; exit 3");
        let output = runner.run(request(Duration::from_secs(5))).await.unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "boom");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = script("sleep 30");
        let started = Instant::now();

        let result = runner.run(request(Duration::from_millis(200))).await;

        assert_eq!(result, Err(AgentError::Timeout(0)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancel_kills_process() {
        let runner = script("sleep 30");
        let req = request(Duration::from_secs(30));
        let cancel = req.cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let result = runner.run(req).await;
        assert_eq!(result, Err(AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let runner = CliAgentRunner::new("/nonexistent/agent-binary");
        let result = runner.run(request(Duration::from_secs(1))).await;
        assert!(matches!(result, Err(AgentError::Spawn(_))));
    }
}
