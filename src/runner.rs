//! Process runner — executes one invocation under a deadline and
//! classifies the outcome.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::Invocation;
use crate::error::ExecError;

/// Outcome of one command execution, consumed immediately by the output
/// interpreter. Non-zero exits and timeouts are outcomes, not errors.
#[derive(Debug)]
pub enum ExecutionResult {
    Success { stdout: Vec<u8> },
    NonZeroExit { code: i32, stderr: Vec<u8> },
    TimedOut { timeout: Duration },
}

/// Executes invocations with exact arguments — no shell in between.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Launch the process and wait for it to exit, the deadline to
    /// elapse, or shutdown. On deadline or shutdown the process is
    /// forcibly killed; no partial output is salvaged.
    pub async fn execute(
        &self,
        invocation: Invocation,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> Result<ExecutionResult, ExecError> {
        let mut command = Command::new(&invocation.executable);
        command
            .args(&invocation.arguments)
            .env_clear()
            .envs(invocation.environment.iter().map(|(k, v)| (k, v)))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        debug!(
            executable = %invocation.executable,
            args = ?invocation.arguments,
            "running command"
        );

        let mut child = command.spawn().map_err(|source| ExecError::Launch {
            executable: invocation.executable.clone(),
            source,
        })?;

        if let Some(bytes) = invocation.stdin
            && let Some(mut handle) = child.stdin.take()
        {
            // Feed stdin concurrently so a process that writes before
            // reading cannot deadlock against us.
            tokio::spawn(async move {
                let _ = handle.write_all(&bytes).await;
                let _ = handle.shutdown().await;
            });
        }

        // Dropping the wait future on the other branches drops the child,
        // and kill_on_drop terminates the process.
        let wait = child.wait_with_output();

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(ExecError::Interrupted),
            _ = tokio::time::sleep(timeout) => {
                debug!(?timeout, executable = %invocation.executable, "command deadline elapsed");
                Ok(ExecutionResult::TimedOut { timeout })
            }
            output = wait => {
                let output = output?;
                if output.status.success() {
                    Ok(ExecutionResult::Success { stdout: output.stdout })
                } else {
                    Ok(ExecutionResult::NonZeroExit {
                        code: output.status.code().unwrap_or(-1),
                        stderr: output.stderr,
                    })
                }
            }
        }
    }
}
