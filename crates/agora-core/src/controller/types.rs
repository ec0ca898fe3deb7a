use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CoordinationConfig;
use crate::context::{InboxMessage, Message};
use crate::retry::RetryConfig;

/// Controller lifecycle state.
///
/// `Stopped` is both the initial and the terminal state; `Idle` and
/// `Running` cycle during operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    /// Not running; initial and terminal
    Stopped,
    /// Waiting for the poll interval or a wake signal
    Idle,
    /// A backend run is in flight
    Running,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Everything a backend gets to see for one run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The agent this run is for
    pub agent: String,
    /// The unread inbox batch that triggered the run
    pub inbox: Vec<InboxMessage>,
    /// Recent channel window, visibility-filtered for the agent
    pub channel_window: Vec<Message>,
    /// Current text of the default document, if any
    pub document: Option<String>,
}

/// Result of one backend run attempt
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Whether the run succeeded
    pub success: bool,
    /// Error description on failure
    pub error: Option<String>,
    /// How long the attempt took
    pub duration: Duration,
}

impl RunOutcome {
    /// A successful run.
    #[must_use]
    pub fn ok(duration: Duration) -> Self {
        Self {
            success: true,
            error: None,
            duration,
        }
    }

    /// A failed run.
    #[must_use]
    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

/// Summary of a finished batch, delivered through the completion callback
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The agent whose backend ran
    pub agent: String,
    /// Whether any attempt succeeded
    pub success: bool,
    /// Attempts consumed (1-based)
    pub attempts: u32,
    /// Last error, when every attempt failed
    pub error: Option<String>,
    /// Wall time across all attempts including backoff
    pub duration: Duration,
    /// The timestamp the inbox was acknowledged to
    pub acked_until: String,
}

/// Callback invoked after each batch (success or terminal failure)
pub type CompletionCallback = Arc<dyn Fn(RunReport) + Send + Sync>;

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long to wait between inbox polls
    pub poll_interval: Duration,
    /// Retry behavior for failed backend runs
    pub retry: RetryConfig,
    /// Recent channel entries included in each run context
    pub channel_window: usize,
}

impl ControllerConfig {
    /// Derive controller tuning from the workspace configuration.
    #[must_use]
    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            retry: config.retry.clone(),
            channel_window: config.channel_window,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_config(&CoordinationConfig::default())
    }
}

/// Controller state machine error
#[derive(Debug, Error)]
pub enum ControllerError {
    /// `start()` was called on a controller that is not freshly stopped
    #[error("controller for '{0}' was already started")]
    AlreadyStarted(String),
}
