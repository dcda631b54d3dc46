use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AnalyzerError;

const CLAUDE_BIN: &str = "claude";

/// How an analyzer reaches the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    /// Bound on a single CLI run, separate from the dispatcher's per-task timeout.
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn cli_args<'a>(system_prompt: &'a str, model: &'a str) -> [&'a str; 7] {
    [
        "-p",
        "--system-prompt",
        system_prompt,
        "--model",
        model,
        "--output-format",
        "text",
    ]
}

/// Run the CLI once. The transaction payload goes in on stdin; the raw reply
/// text comes back.
///
/// The child is killed when this future is dropped, so a dispatcher timeout
/// or deadline cancellation leaves no process behind.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AnalyzerError> {
    debug!(model = %config.model, prompt_bytes = user_prompt.len(), "Invoking claude CLI");

    let run = async {
        let mut child = Command::new(CLAUDE_BIN)
            .args(cli_args(system_prompt, &config.model))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(user_prompt.as_bytes())
                .await
                .map_err(|e| AnalyzerError::Cli(format!("failed to write prompt: {e}")))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| AnalyzerError::Cli(format!("failed to read output: {e}")))
    };

    let output = tokio::time::timeout(config.timeout, run)
        .await
        .map_err(|_| AnalyzerError::Timeout(config.timeout.as_millis() as u64))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr.trim(), "Claude CLI exited with failure");
        return Err(AnalyzerError::Cli(format!(
            "{CLAUDE_BIN} exited {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    reply_text(&output.stdout)
}

fn spawn_error(e: std::io::Error) -> AnalyzerError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AnalyzerError::Unavailable(format!("{CLAUDE_BIN} not found on PATH"))
    } else {
        AnalyzerError::Cli(format!("failed to spawn {CLAUDE_BIN}: {e}"))
    }
}

fn reply_text(stdout: &[u8]) -> Result<String, AnalyzerError> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Err(AnalyzerError::Cli("empty reply".to_string()));
    }
    Ok(text.into_owned())
}

/// Whether `claude --version` runs successfully.
pub async fn check_cli_available() -> bool {
    Command::new(CLAUDE_BIN)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|status| status.success())
}
