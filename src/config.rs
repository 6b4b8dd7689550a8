//! Configuration types — rule definitions, loading, validation.
//!
//! The config file is YAML: an ordered `rules` list plus a global
//! `commandTimeout`. Validation runs once at load; the process must not
//! start with an invalid rule set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Timeout applied when `commandTimeout` is absent or unparseable.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// A pattern-to-command binding configured by an operator.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Human-readable rule name, used in logs and outcome reporting.
    #[serde(default)]
    pub name: String,
    /// Regular expression matched against message text (unanchored).
    pub pattern: String,
    /// Working directory for the command; the process's own cwd if unset.
    #[serde(default, rename = "workingDir")]
    pub working_dir: Option<PathBuf>,
    /// Deliver the message text on stdin instead of as a trailing argument.
    #[serde(default, rename = "useStdin")]
    pub use_stdin: bool,
    /// Extra KEY=VALUE entries appended to the process environment.
    #[serde(default, rename = "env")]
    pub environment: Vec<String>,
    /// Executable plus fixed arguments. Must be non-empty.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Rule {
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if let Err(e) = regex::Regex::new(&self.pattern) {
            return Err(ConfigError::InvalidRule {
                index,
                name: self.name.clone(),
                reason: format!("invalid regex: {e}"),
            });
        }
        if self.command.is_empty() {
            return Err(ConfigError::InvalidRule {
                index,
                name: self.name.clone(),
                reason: "command cannot be empty".into(),
            });
        }
        Ok(())
    }
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ordered rule list; earlier rules win when several match.
    pub rules: Vec<Rule>,
    /// Per-command timeout as a duration string, e.g. `"30s"` or `"5m"`.
    #[serde(default, rename = "commandTimeout")]
    pub command_timeout: Option<String>,
}

impl Config {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the rule list. Every pattern must compile and every
    /// command must be non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rules.is_empty() {
            return Err(ConfigError::NoRules);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate(index)?;
        }
        Ok(())
    }

    /// Resolve the command timeout, falling back to one minute when the
    /// string is absent or unparseable.
    pub fn command_timeout(&self) -> Duration {
        match self.command_timeout.as_deref() {
            None => DEFAULT_COMMAND_TIMEOUT,
            Some(raw) => parse_duration(raw).unwrap_or_else(|| {
                tracing::warn!(timeout = raw, "unparseable commandTimeout, using default");
                DEFAULT_COMMAND_TIMEOUT
            }),
        }
    }
}

/// Parse a human-friendly duration string.
///
/// Supported suffixes: `ms`, `s`, `m`, `h`. Examples: `"500ms"`, `"30s"`, `"5m"`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| c.is_alphabetic())?;
    let (num, suffix) = input.split_at(split);
    let value: u64 = num.parse().ok()?;

    match suffix {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}
