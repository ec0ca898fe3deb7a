use serde::Serialize;

use crate::controller::ControllerState;

/// Events emitted while a multi-agent run makes progress.
///
/// Events carry identifiers and summaries, not full payloads; subscribers
/// fetch detail through the provider or proposal manager.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    /// A message was appended to the shared channel
    MessageAppended {
        /// Channel timestamp of the new entry
        timestamp: String,
        /// Sender identity
        from: String,
        /// Agents mentioned in the content (first-occurrence order)
        mentions: Vec<String>,
        /// Direct-message recipient, if any
        to: Option<String>,
    },
    /// An agent acknowledged its inbox up to a timestamp
    InboxAcknowledged {
        /// The acknowledging agent
        agent: String,
        /// New cursor value
        until: String,
    },
    /// A proposal was created
    ProposalCreated {
        /// Proposal id (`prop-<n>`)
        proposal_id: String,
        /// Creating agent
        created_by: String,
    },
    /// A proposal reached a terminal state
    ProposalClosed {
        /// Proposal id
        proposal_id: String,
        /// Terminal status as a string (`resolved`, `expired`, `cancelled`)
        status: String,
        /// Winning option id, if one was picked
        winner: Option<String>,
    },
    /// A controller began a backend run
    RunStarted {
        /// The agent whose backend is running
        agent: String,
        /// Number of inbox messages in the batch
        batch_size: usize,
    },
    /// A controller finished a backend run (including terminal failures)
    RunCompleted {
        /// The agent whose backend ran
        agent: String,
        /// Whether any attempt succeeded
        success: bool,
        /// Attempts consumed
        attempts: u32,
    },
    /// A controller changed state
    ControllerStateChanged {
        /// The controller's agent
        agent: String,
        /// The new state
        state: ControllerState,
    },
}

impl CoordinationEvent {
    /// The agent this event concerns, if it concerns exactly one.
    #[must_use]
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::MessageAppended { .. } | Self::ProposalCreated { .. } => None,
            Self::ProposalClosed { .. } => None,
            Self::InboxAcknowledged { agent, .. }
            | Self::RunStarted { agent, .. }
            | Self::RunCompleted { agent, .. }
            | Self::ControllerStateChanged { agent, .. } => Some(agent),
        }
    }
}
