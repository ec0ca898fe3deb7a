use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a channel entry participates in routing and visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Normal agent-visible message (default)
    Chat,
    /// Operational entry, hidden from agents and inboxes
    Log,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Chat
    }
}

/// An entry in the shared channel. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sortable timestamp, strictly increasing within one provider instance
    pub timestamp: String,
    /// Sender identity (agent name or synthetic sender)
    pub from: String,
    /// Message body
    pub content: String,
    /// Known agent names mentioned in the body, first-occurrence order
    #[serde(default)]
    pub mentions: Vec<String>,
    /// Direct-message recipient; restricts visibility to sender + recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Entry kind
    #[serde(default)]
    pub kind: MessageKind,
}

/// Derived inbox priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Default priority
    Normal,
    /// Multiple mentions or urgency keywords in the content
    High,
}

/// A channel entry as seen from one agent's inbox.
///
/// Never stored; recomputed on every inbox read.
#[derive(Debug, Clone, Serialize)]
pub struct InboxMessage {
    /// The underlying channel entry
    pub message: Message,
    /// Derived priority
    pub priority: Priority,
}

/// Options for appending a channel entry
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Direct-message recipient
    pub to: Option<String>,
    /// Entry kind override (defaults to `Chat`)
    pub kind: Option<MessageKind>,
}

impl AppendOptions {
    /// Options for a public chat entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the entry to a single recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to = Some(recipient.into());
        self
    }

    /// Mark the entry as an operational log line, hidden from agents.
    #[must_use]
    pub fn log(mut self) -> Self {
        self.kind = Some(MessageKind::Log);
        self
    }
}

/// Filter for reading the channel
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    /// Exclusive lower bound on timestamp
    pub since: Option<String>,
    /// Keep only the last N matching entries (chronological order preserved)
    pub limit: Option<usize>,
    /// Apply visibility rules from this agent's point of view
    pub agent: Option<String>,
}

impl ChannelFilter {
    /// Unfiltered view of the whole channel.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep entries strictly after `timestamp`.
    #[must_use]
    pub fn since(mut self, timestamp: impl Into<String>) -> Self {
        self.since = Some(timestamp.into());
        self
    }

    /// Keep only the last `n` matches.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Apply visibility rules for `agent`.
    #[must_use]
    pub fn for_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Content-type tag for a resource blob; selects the storage suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Plain text (`.txt`)
    Text,
    /// JSON document (`.json`)
    Json,
    /// Unified diff (`.diff`)
    Diff,
}

impl ResourceKind {
    /// Storage suffix for this kind.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Diff => "diff",
        }
    }

    /// Suffix probe order used when reading a resource by bare id.
    pub const PROBE_ORDER: [ResourceKind; 3] = [Self::Text, Self::Json, Self::Diff];
}

/// Handle returned by resource creation
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRef {
    /// Generated opaque id
    pub id: String,
    /// Channel-embeddable reference token (`resource:<id>`)
    pub reference: String,
}

/// Context provider error
#[derive(Debug, Error)]
pub enum ContextError {
    /// `create` was called for a document that already exists
    #[error("document '{0}' already exists")]
    DocumentAlreadyExists(String),

    /// No resource stored under the id with any known suffix
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] agora_store::StorageError),

    /// A record could not be encoded for persistence
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for context operations
pub type ContextResult<T> = std::result::Result<T, ContextError>;
