//! Coordination configuration
//!
//! Configuration for a multi-agent run: the agent roster, channel and inbox
//! tuning, controller scheduling, and proposal defaults. Loadable from TOML
//! with per-field defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::retry::RetryConfig;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unusable value
    #[error("invalid configuration: {field}: {message}")]
    Invalid {
        /// Config field name
        field: String,
        /// What is wrong with it
        message: String,
    },
}

/// Configuration for a coordination workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Known agent names; mentions are matched against this set
    pub agents: Vec<String>,
    /// Document name used when callers omit one
    #[serde(default = "default_document")]
    pub default_document: String,
    /// Case-insensitive keywords that raise inbox priority to high
    #[serde(default = "default_urgency_keywords")]
    pub urgency_keywords: Vec<String>,
    /// Recent channel entries included in each run context
    #[serde(default = "default_channel_window")]
    pub channel_window: usize,
    /// Controller poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Retry behavior for failed backend runs
    #[serde(default)]
    pub retry: RetryConfig,
    /// Default proposal timeout in seconds
    #[serde(default = "default_proposal_timeout_secs")]
    pub proposal_timeout_secs: i64,
    /// Idle debounce window in milliseconds
    #[serde(default = "default_idle_debounce_ms")]
    pub idle_debounce_ms: u64,
}

fn default_document() -> String {
    "main".to_string()
}

fn default_urgency_keywords() -> Vec<String> {
    ["urgent", "asap", "blocked", "critical"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_channel_window() -> usize {
    20
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_proposal_timeout_secs() -> i64 {
    3_600
}

fn default_idle_debounce_ms() -> u64 {
    500
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            default_document: default_document(),
            urgency_keywords: default_urgency_keywords(),
            channel_window: default_channel_window(),
            poll_interval_ms: default_poll_interval_ms(),
            retry: RetryConfig::default(),
            proposal_timeout_secs: default_proposal_timeout_secs(),
            idle_debounce_ms: default_idle_debounce_ms(),
        }
    }
}

impl CoordinationConfig {
    /// Create a configuration for the given agent roster, defaults elsewhere.
    #[must_use]
    pub fn new(agents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            agents: agents.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the controller poll interval.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the idle debounce window.
    #[must_use]
    pub fn with_idle_debounce_ms(mut self, ms: u64) -> Self {
        self.idle_debounce_ms = ms;
        self
    }

    /// Set the default proposal timeout.
    #[must_use]
    pub fn with_proposal_timeout_secs(mut self, secs: i64) -> Self {
        self.proposal_timeout_secs = secs;
        self
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid {
                field: "agents".to_string(),
                message: "at least one agent is required".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.is_empty() || !agent.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(ConfigError::Invalid {
                    field: "agents".to_string(),
                    message: format!("agent name '{agent}' must be a non-empty word"),
                });
            }
            if !seen.insert(agent) {
                return Err(ConfigError::Invalid {
                    field: "agents".to_string(),
                    message: format!("duplicate agent name '{agent}'"),
                });
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.proposal_timeout_secs <= 0 {
            return Err(ConfigError::Invalid {
                field: "proposal_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
