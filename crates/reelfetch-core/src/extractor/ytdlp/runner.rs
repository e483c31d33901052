//! External command execution for the yt-dlp strategy

use crate::extractor::strategy::StrategyError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Captured result of one command run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
    /// Exit code, -1 when terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    /// Command exited with status 0
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best error text: stderr, or stdout when stderr is empty
    #[must_use]
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs an external program to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it when `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::Timeout`] on timeout and
    /// [`StrategyError::DownloadFailed`] if the program cannot be started.
    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<CommandOutput, StrategyError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    #[instrument(skip(self, args), fields(arg_count = args.len()))]
    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<CommandOutput, StrategyError> {
        let child = tokio::process::Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StrategyError::DownloadFailed {
                message: format!("failed to start {program}: {e}"),
            })?;

        // Dropping the future on timeout kills the child
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(program, ?timeout, "Command timed out");
                return Err(StrategyError::Timeout(timeout));
            }
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        debug!(
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_prefers_stderr() {
        let output = CommandOutput {
            stdout: "out".to_string(),
            stderr: "  ERROR: login required\n".to_string(),
            exit_code: 1,
        };
        assert_eq!(output.error_text(), "ERROR: login required");
        assert!(!output.success());

        let output = CommandOutput {
            stdout: "only stdout\n".to_string(),
            stderr: "\n".to_string(),
            exit_code: 1,
        };
        assert_eq!(output.error_text(), "only stdout");
    }

    #[tokio::test]
    async fn test_missing_program_is_download_failure() {
        let err = ProcessRunner
            .run(
                "reelfetch-definitely-missing-binary",
                vec!["--version".to_string()],
                Duration::from_secs(5),
            )
            .await
            .expect_err("binary does not exist");

        assert!(matches!(err, StrategyError::DownloadFailed { .. }));
    }
}
