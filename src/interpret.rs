//! Output interpreter — converts raw process output into a reply body.
//!
//! Successful stdout is classified first (structural prefix check), then
//! parsed into the known structured shape. Failure outcomes become
//! human-readable reply text. An empty body means no reply at all.

use serde::Deserialize;

use crate::error::InterpretError;
use crate::runner::ExecutionResult;

/// Structured command output: an object carrying the reply text.
#[derive(Debug, Deserialize)]
struct StructuredReply {
    #[serde(default)]
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum OutputKind {
    Plain,
    Structured,
}

/// Structural check only; whether the payload actually parses is the
/// second step.
fn classify(stdout: &str) -> OutputKind {
    if stdout.trim_start().starts_with('{') {
        OutputKind::Structured
    } else {
        OutputKind::Plain
    }
}

/// Produce the reply body for an execution result.
///
/// `Ok(None)` means no reply should be sent.
pub fn interpret(result: ExecutionResult) -> Result<Option<String>, InterpretError> {
    let body = match result {
        ExecutionResult::Success { stdout } => {
            let text = String::from_utf8_lossy(&stdout).into_owned();
            match classify(&text) {
                OutputKind::Structured => {
                    let parsed: StructuredReply =
                        serde_json::from_str(&text).map_err(InterpretError::UnknownOutputFormat)?;
                    parsed.message
                }
                // Plain stdout is the reply, verbatim.
                OutputKind::Plain => text,
            }
        }
        ExecutionResult::NonZeroExit { code, stderr } => {
            format!(
                "error: command exited with code={code}\n\n{}",
                String::from_utf8_lossy(&stderr)
            )
        }
        ExecutionResult::TimedOut { timeout } => {
            format!("error: command timed out after {timeout:?}")
        }
    };

    if body.is_empty() { Ok(None) } else { Ok(Some(body)) }
}
