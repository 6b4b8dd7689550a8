//! Error types for chatcmd.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Command build error: {0}")]
    Build(#[from] BuildError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Output error: {0}")]
    Interpret(#[from] InterpretError),
}

/// Configuration-related errors. All of these are fatal at startup —
/// the process must not run with an invalid rule set.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Rule list cannot be empty")]
    NoRules,

    #[error("Invalid rule {index} ({name}): {reason}")]
    InvalidRule {
        index: usize,
        name: String,
        reason: String,
    },
}

/// Errors constructing an invocation from a rule and a message.
///
/// Unreachable after config validation; kept as a distinct type so the
/// builder stays total over unvalidated rules.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Rule {name} has an empty command")]
    EmptyCommand { name: String },
}

/// Errors executing an invocation. Non-zero exits and timeouts are NOT
/// errors — they are regular [`crate::runner::ExecutionResult`] outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to launch {executable}: {source}")]
    Launch {
        executable: String,
        source: std::io::Error,
    },

    #[error("Execution interrupted by shutdown")]
    Interrupted,

    #[error("IO error while waiting for process: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors interpreting process output into a reply body.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("Output looks structured but could not be parsed: {0}")]
    UnknownOutputFormat(serde_json::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send reply on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
