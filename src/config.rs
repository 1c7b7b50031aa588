//! Bridge configuration parsing and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Timeout values (seconds) for blocking bridge interactions.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Deadline for a host-fulfilled tool call before it is abandoned.
    #[serde(default = "default_tool_seconds")]
    pub tool_seconds: u64,
    /// Maximum time to wait for the agent process's ready signal.
    #[serde(default = "default_startup_seconds")]
    pub startup_seconds: u64,
}

fn default_tool_seconds() -> u64 {
    30
}

fn default_startup_seconds() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            tool_seconds: default_tool_seconds(),
            startup_seconds: default_startup_seconds(),
        }
    }
}

/// Agent runtime process configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Agent CLI binary spawned when a session starts.
    #[serde(default = "default_agent_cli")]
    pub cli: String,
    /// Arguments passed to the agent CLI.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the agent process; defaults to the bridge's cwd.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

fn default_agent_cli() -> String {
    "modelwar-agent".to_owned()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cli: default_agent_cli(),
            args: Vec::new(),
            workspace_root: None,
        }
    }
}

/// Top-level bridge configuration, loaded from an optional TOML file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Timeout settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Agent process settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

impl BridgeConfig {
    /// Parse a configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the TOML is malformed or a value
    /// fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read config: {err}")))?;
        Self::from_toml_str(&text)
    }

    /// Deadline for a single host-fulfilled tool call.
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.tool_seconds)
    }

    /// Maximum time to wait for the agent process's ready signal.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.startup_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.timeouts.tool_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.tool_seconds must be greater than zero".into(),
            ));
        }
        if self.agent.cli.trim().is_empty() {
            return Err(AppError::Config("agent.cli must not be empty".into()));
        }
        Ok(())
    }
}
