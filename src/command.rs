//! Command builder — resolves a matched rule and an inbound message into
//! a fully specified process invocation.

use std::path::PathBuf;

use crate::channels::InboundMessage;
use crate::config::Rule;
use crate::error::BuildError;

/// Marker separating fixed arguments from the message text, so the text
/// can never be interpreted as additional flags.
const ARG_SEPARATOR: &str = "--";

/// Environment variables derived from the inbound message.
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_FROM_USER_ID: &str = "TELEGRAM_FROM_USER_ID";
pub const ENV_REPLY_TO_MESSAGE_ID: &str = "TELEGRAM_REPLY_TO_MESSAGE_ID";
pub const ENV_REPLY_TO_MESSAGE_TEXT: &str = "TELEGRAM_REPLY_TO_MESSAGE_TEXT";

/// A fully resolved, ready-to-execute external command description.
///
/// Built fresh per dispatched message and consumed by the process runner.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub executable: String,
    pub arguments: Vec<String>,
    /// Working directory; the dispatcher process's own cwd when unset.
    pub working_dir: Option<PathBuf>,
    /// Ordered environment. Later entries shadow earlier ones on key
    /// conflict; shadowing is positional, never a map merge.
    pub environment: Vec<(String, String)>,
    /// Bytes delivered on the process's stdin, when the rule asks for it.
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    /// Effective value for `key` after shadowing (the last entry wins).
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.environment
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Builds invocations against a fixed base environment.
///
/// The base environment is captured once at construction and copied per
/// invocation, never mutated in place.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    base_env: Vec<(String, String)>,
}

impl CommandBuilder {
    /// Builder layering on the current process's environment.
    pub fn from_process_env() -> Self {
        Self {
            base_env: std::env::vars().collect(),
        }
    }

    /// Builder over an explicit base environment.
    pub fn with_base_env(base_env: Vec<(String, String)>) -> Self {
        Self { base_env }
    }

    /// Construct the invocation for `rule` applied to `message`.
    pub fn build(&self, rule: &Rule, message: &InboundMessage) -> Result<Invocation, BuildError> {
        let Some((executable, fixed_args)) = rule.command.split_first() else {
            return Err(BuildError::EmptyCommand {
                name: rule.name.clone(),
            });
        };

        let mut arguments: Vec<String> = fixed_args.to_vec();
        let stdin = if rule.use_stdin {
            Some(message.text.clone().into_bytes())
        } else {
            arguments.push(ARG_SEPARATOR.to_string());
            arguments.push(message.text.clone());
            None
        };

        // Layered concatenation: process env, then rule env, then
        // message-derived env. Order is the override mechanism.
        let mut environment = self.base_env.clone();
        environment.extend(rule.environment.iter().map(|e| split_env_entry(e)));
        environment.push((ENV_CHAT_ID.into(), message.conversation_id.clone()));
        environment.push((ENV_FROM_USER_ID.into(), message.sender_id.clone()));
        if let Some(replied) = &message.replied_to {
            environment.push((ENV_REPLY_TO_MESSAGE_ID.into(), replied.id.clone()));
            environment.push((ENV_REPLY_TO_MESSAGE_TEXT.into(), replied.text.clone()));
        }

        let working_dir = rule
            .working_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty());

        Ok(Invocation {
            executable: executable.clone(),
            arguments,
            working_dir,
            environment,
            stdin,
        })
    }
}

/// Split a `KEY=VALUE` config entry. An entry without `=` becomes a key
/// with an empty value.
fn split_env_entry(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (entry.to_string(), String::new()),
    }
}
