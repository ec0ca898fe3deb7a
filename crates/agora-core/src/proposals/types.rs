use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of decision a proposal represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    /// Pick an agent for a role
    Election,
    /// Pick one of several courses of action
    Decision,
    /// Approve or reject a single item
    Approval,
    /// Assign a task to an agent
    Assignment,
}

/// How votes turn into a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionKind {
    /// Highest count wins once quorum is met
    Plurality,
    /// Top count must exceed half of the votes cast
    Majority,
    /// Every cast vote must agree
    Unanimous,
}

/// Policy for picking a winner when the top count is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreaker {
    /// First tied option in count-sorted order
    First,
    /// Uniformly random among the tied options
    Random,
    /// Leave unresolved; only a vote change can break the tie
    CreatorDecides,
}

/// Resolution rule attached to a proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRule {
    /// Vote-counting rule
    #[serde(rename = "type")]
    pub kind: ResolutionKind,
    /// Minimum votes cast before resolution is evaluated; defaults to the
    /// total number of known agents when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<usize>,
    /// Tie-break policy
    #[serde(default = "default_tie_breaker")]
    pub tie_breaker: TieBreaker,
}

fn default_tie_breaker() -> TieBreaker {
    TieBreaker::First
}

impl Default for ResolutionRule {
    fn default() -> Self {
        Self {
            kind: ResolutionKind::Plurality,
            quorum: None,
            tie_breaker: TieBreaker::First,
        }
    }
}

impl ResolutionRule {
    /// Plurality with default tie-break.
    #[must_use]
    pub fn plurality() -> Self {
        Self::default()
    }

    /// Majority of votes cast.
    #[must_use]
    pub fn majority() -> Self {
        Self {
            kind: ResolutionKind::Majority,
            ..Self::default()
        }
    }

    /// Every cast vote must agree.
    #[must_use]
    pub fn unanimous() -> Self {
        Self {
            kind: ResolutionKind::Unanimous,
            ..Self::default()
        }
    }

    /// Set an explicit quorum.
    #[must_use]
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = Some(quorum);
        self
    }

    /// Set the tie-break policy.
    #[must_use]
    pub fn with_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }
}

/// Lifecycle status; terminal once non-active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Accepting votes
    Active,
    /// A winner was picked by the resolution rule
    Resolved,
    /// Timed out before resolving
    Expired,
    /// Cancelled by its creator
    Cancelled,
}

/// How a proposal reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedBy {
    /// Quorum met and the resolution rule picked a winner
    Quorum,
    /// Expired; winner (if any) picked from the votes present
    Timeout,
    /// Cancelled by the creator
    Cancelled,
}

/// One votable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalOption {
    /// Option id, unique within the proposal
    pub id: String,
    /// Human-readable label
    pub label: String,
}

impl ProposalOption {
    /// Create an option with id == label.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
        }
    }

    /// Create an option with a separate label.
    #[must_use]
    pub fn labeled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Accumulated votes and outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalResult {
    /// voter → option id; one active vote per voter, last write wins
    #[serde(default)]
    pub votes: HashMap<String, String>,
    /// option id → vote count, recomputed after every vote
    #[serde(default)]
    pub counts: HashMap<String, usize>,
    /// voter → free-text reason
    #[serde(default)]
    pub reasons: HashMap<String, String>,
    /// Winning option id, once picked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    /// When the proposal left the active state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// What closed the proposal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<ResolvedBy>,
}

/// A group decision in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Monotonically assigned id (`prop-<n>`); never reused
    pub id: String,
    /// Decision kind
    pub kind: ProposalKind,
    /// Short title
    pub title: String,
    /// Longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Votable options (unique ids)
    pub options: Vec<ProposalOption>,
    /// Creating agent
    pub created_by: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Resolution rule
    pub resolution: ResolutionRule,
    /// Whether the outcome binds the group
    pub binding: bool,
    /// Lifecycle status
    pub status: ProposalStatus,
    /// Votes and outcome
    #[serde(default)]
    pub result: ProposalResult,
}

impl Proposal {
    /// Whether the proposal is still accepting votes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ProposalStatus::Active
    }

    /// Whether the proposal is active but past its expiry time.
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.expires_at
    }

    /// Whether `choice` is one of this proposal's option ids.
    #[must_use]
    pub fn has_option(&self, choice: &str) -> bool {
        self.options.iter().any(|o| o.id == choice)
    }
}

/// Parameters for creating a proposal
#[derive(Debug, Clone)]
pub struct ProposalSpec {
    /// Decision kind
    pub kind: ProposalKind,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: Option<String>,
    /// Votable options; may be empty only for `Approval` (defaults to
    /// approve/reject)
    pub options: Vec<ProposalOption>,
    /// Resolution rule (plurality by default)
    pub resolution: ResolutionRule,
    /// Whether the outcome binds the group
    pub binding: bool,
    /// Expiry override in seconds; the manager default applies when unset
    pub timeout_secs: Option<i64>,
    /// Creating agent
    pub created_by: String,
}

impl ProposalSpec {
    /// Create a spec with the given kind, title, and creator.
    #[must_use]
    pub fn new(kind: ProposalKind, title: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: None,
            options: Vec::new(),
            resolution: ResolutionRule::default(),
            binding: false,
            timeout_secs: None,
            created_by: created_by.into(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the options.
    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = ProposalOption>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    /// Set the resolution rule.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ResolutionRule) -> Self {
        self.resolution = resolution;
        self
    }

    /// Mark the outcome as binding.
    #[must_use]
    pub fn binding(mut self) -> Self {
        self.binding = true;
        self
    }

    /// Override the expiry timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Proposal lifecycle or voting error
#[derive(Debug, Error)]
pub enum ProposalError {
    /// No proposal with this id
    #[error("proposal '{0}' not found")]
    NotFound(String),

    /// Proposal has already reached a terminal state
    #[error("proposal '{0}' is not active")]
    NotActive(String),

    /// Proposal is past its expiry (transitioned to expired as a side effect)
    #[error("proposal '{0}' has expired")]
    Expired(String),

    /// Voter is not in the known-agents set
    #[error("unknown voter '{0}'")]
    UnknownVoter(String),

    /// Choice is not one of the proposal's option ids
    #[error("'{choice}' is not an option of proposal '{proposal}'")]
    InvalidChoice {
        /// Proposal id
        proposal: String,
        /// The rejected choice
        choice: String,
    },

    /// Non-approval proposal created without options
    #[error("proposal type requires at least one option")]
    MissingOptions,

    /// Two options share an id
    #[error("duplicate option id '{0}'")]
    DuplicateOption(String),

    /// Only the creator may cancel
    #[error("agent '{agent}' is not the creator of proposal '{proposal}'")]
    NotCreator {
        /// Proposal id
        proposal: String,
        /// The agent that tried to cancel
        agent: String,
    },

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] agora_store::StorageError),

    /// The working-set snapshot could not be encoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
