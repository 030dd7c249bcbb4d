//! Claude Code CLI backend
//!
//! Invokes `claude -p` with no tool permissions and stream-JSON output, and
//! returns the final result text. The CLI has no temperature flag, so the
//! request temperature is ignored.

pub mod stream;

use std::process::{Command, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use super::{ProviderError, ProviderRequest, TextProvider};
use stream::{api_error_status, parse_event, StreamAccumulator, StreamEvent};

/// Text provider backed by the local `claude` binary.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeProvider {
    model: Option<String>,
}

impl ClaudeCodeProvider {
    /// Create a provider; `None` leaves model selection to the CLI.
    #[must_use]
    pub const fn new(model: Option<String>) -> Self {
        Self { model }
    }

    /// Build the `claude` invocation for a request.
    ///
    /// Uses `-p` for non-interactive execution, `--verbose` and
    /// `--output-format stream-json` for structured output, and
    /// `--append-system-prompt` for the system instruction.
    #[must_use]
    pub fn build_command(&self, request: &ProviderRequest) -> Command {
        let mut cmd = Command::new("claude");

        cmd.arg("-p").arg(&request.user_prompt);
        cmd.arg("--verbose");
        cmd.arg("--output-format").arg("stream-json");

        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }

        if let Some(system) = &request.system_prompt {
            cmd.arg("--append-system-prompt").arg(system);
        }

        cmd
    }
}

#[async_trait]
impl TextProvider for ClaudeCodeProvider {
    fn name(&self) -> &str {
        "claude-code"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        debug!(
            temperature = request.temperature,
            "claude CLI has no temperature flag; ignoring"
        );

        let mut child = TokioCommand::from(self.build_command(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::new(format!("Failed to spawn claude: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::new("No stdout from claude"))?;
        let accumulator = read_session(BufReader::new(stdout)).await?;

        let status = child
            .wait()
            .await
            .map_err(|e| ProviderError::new(format!("Failed waiting for claude: {e}")))?;

        match &accumulator.result {
            Some(StreamEvent::Result {
                is_error: true,
                result_text,
                ..
            }) => Err(match api_error_status(result_text) {
                Some(code) => ProviderError::with_status(code, result_text.clone()),
                None => ProviderError::new(result_text.clone()),
            }),
            None if !status.success() => Err(ProviderError::new(format!(
                "claude exited with status {}",
                status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string())
            ))),
            _ => Ok(accumulator.final_text()),
        }
    }
}

/// Drain stream-JSON lines until the result event.
///
/// A read error returns early; the caller's child is killed when dropped.
async fn read_session<R>(reader: R) -> Result<StreamAccumulator, ProviderError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accumulator = StreamAccumulator::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to read claude output: {e}")))?
    {
        let Some(event) = parse_event(&line) else {
            continue;
        };
        accumulator.process(&event);
        match &event {
            StreamEvent::SystemInit { model } => debug!(model = %model, "claude session started"),
            StreamEvent::Result {
                is_error,
                duration_ms,
                ..
            } => {
                debug!(is_error, duration_ms, "claude session finished");
                break;
            }
            _ => {}
        }
    }

    Ok(accumulator)
}
