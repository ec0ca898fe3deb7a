use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agora_store::StorageBackend;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::mentions::extract_mentions;
use super::types::{
    AppendOptions, ChannelFilter, ContextError, ContextResult, InboxMessage, Message, MessageKind,
    Priority, ResourceKind, ResourceRef,
};
use crate::config::CoordinationConfig;
use crate::events::{CoordinationEvent, EventBus};

/// Storage key of the append-only channel log (one JSON record per line)
const CHANNEL_KEY: &str = "channel/log";
/// Storage key of the inbox cursor record
const CURSORS_KEY: &str = "inbox/cursors";
/// Key prefix for documents
const DOCUMENT_PREFIX: &str = "document/";
/// Key prefix for resources
const RESOURCE_PREFIX: &str = "resource/";

/// Single source of truth for cross-agent visible state.
///
/// Owns channel semantics, mention routing, inbox derivation and
/// acknowledgment, shared documents, and resource blobs. All persistence
/// goes through the injected `StorageBackend`.
pub struct ContextProvider {
    storage: Arc<dyn StorageBackend>,
    agents: Vec<String>,
    default_document: String,
    urgency_keywords: Vec<String>,
    /// In-process sequence counter; the timestamp tie-breaker
    seq: AtomicU64,
    /// Serializes timestamp generation + append so log order == timestamp order
    append_lock: Mutex<()>,
    events: Option<EventBus>,
}

impl ContextProvider {
    /// Create a provider over `storage` for the configured agent roster.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: &CoordinationConfig) -> Self {
        Self {
            storage,
            agents: config.agents.clone(),
            default_document: config.default_document.clone(),
            urgency_keywords: config
                .urgency_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            seq: AtomicU64::new(0),
            append_lock: Mutex::new(()),
            events: None,
        }
    }

    /// Attach an event bus; the provider publishes `MessageAppended` and
    /// `InboxAcknowledged` events on it.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// The configured agent roster.
    #[must_use]
    pub fn known_agents(&self) -> &[String] {
        &self.agents
    }

    /// The document name used when callers omit one.
    #[must_use]
    pub fn default_document(&self) -> &str {
        &self.default_document
    }

    // =========================================================================
    // Channel
    // =========================================================================

    /// Generate the next channel timestamp.
    ///
    /// Fixed-width UTC wall-clock prefix plus a fixed-width monotonically
    /// increasing sequence suffix. The suffix alone breaks ties for entries
    /// appended within the same clock tick, so timestamps are strictly
    /// increasing within one provider instance and downstream "since"
    /// comparisons never tie.
    fn next_timestamp(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        format!("{}-{seq:08}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }

    /// Append an entry to the shared channel and return it.
    ///
    /// Mentions are extracted from `content` against the known agent set;
    /// unknown names are ignored, duplicates collapse preserving
    /// first-occurrence order.
    pub async fn append_channel(
        &self,
        from: impl Into<String>,
        content: impl Into<String>,
        options: AppendOptions,
    ) -> ContextResult<Message> {
        let from = from.into();
        let content = content.into();
        let mentions = extract_mentions(&content, &self.agents);

        let _guard = self.append_lock.lock().await;
        let message = Message {
            timestamp: self.next_timestamp(),
            from,
            content,
            mentions,
            to: options.to,
            kind: options.kind.unwrap_or_default(),
        };

        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        self.storage.append(CHANNEL_KEY, &line).await?;

        debug!(
            timestamp = %message.timestamp,
            from = %message.from,
            mentions = ?message.mentions,
            "Appended channel message"
        );
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::MessageAppended {
                timestamp: message.timestamp.clone(),
                from: message.from.clone(),
                mentions: message.mentions.clone(),
                to: message.to.clone(),
            });
        }
        Ok(message)
    }

    /// Read the whole channel log in timestamp order, no visibility applied.
    async fn read_raw(&self) -> ContextResult<Vec<Message>> {
        let Some(text) = self.storage.read(CHANNEL_KEY).await? else {
            return Ok(Vec::new());
        };
        let mut messages: Vec<Message> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "Skipping unparseable channel line"),
            }
        }
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    /// Read the channel through a filter.
    ///
    /// Visibility rules apply only when `filter.agent` is set: `Log` entries
    /// are always hidden, direct messages are visible only to sender and
    /// recipient, everything else is public. `since` is an exclusive lower
    /// bound; `limit` keeps the last N matches in chronological order.
    pub async fn read_channel(&self, filter: ChannelFilter) -> ContextResult<Vec<Message>> {
        let mut messages = self.read_raw().await?;

        if let Some(agent) = &filter.agent {
            messages.retain(|m| {
                if m.kind == MessageKind::Log {
                    return false;
                }
                match &m.to {
                    Some(recipient) => recipient == agent || &m.from == agent,
                    None => true,
                }
            });
        }
        if let Some(since) = &filter.since {
            messages.retain(|m| m.timestamp.as_str() > since.as_str());
        }
        if let Some(limit) = filter.limit {
            if messages.len() > limit {
                messages.drain(..messages.len() - limit);
            }
        }
        Ok(messages)
    }

    // =========================================================================
    // Inbox
    // =========================================================================

    async fn cursors(&self) -> ContextResult<HashMap<String, String>> {
        let Some(text) = self.storage.read(CURSORS_KEY).await? else {
            return Ok(HashMap::new());
        };
        match serde_json::from_str(&text) {
            Ok(cursors) => Ok(cursors),
            Err(e) => {
                warn!(error = %e, "Inbox cursor record unparseable; treating all as unread");
                Ok(HashMap::new())
            }
        }
    }

    /// The agent's current inbox cursor, if it has acknowledged anything.
    pub async fn cursor(&self, agent: &str) -> ContextResult<Option<String>> {
        Ok(self.cursors().await?.get(agent).cloned())
    }

    /// Derive the agent's unread inbox from the channel.
    ///
    /// Filters the unfiltered channel to entries strictly newer than the
    /// agent's cursor, excluding `Log` entries and the agent's own messages,
    /// keeping entries that mention the agent or are addressed to it.
    /// Idempotent: never mutates the cursor.
    pub async fn get_inbox(&self, agent: &str) -> ContextResult<Vec<InboxMessage>> {
        let cursor = self.cursor(agent).await?.unwrap_or_default();
        let messages = self.read_raw().await?;

        let inbox = messages
            .into_iter()
            .filter(|m| m.timestamp.as_str() > cursor.as_str())
            .filter(|m| m.kind != MessageKind::Log)
            .filter(|m| m.from != agent)
            .filter(|m| {
                m.mentions.iter().any(|name| name == agent) || m.to.as_deref() == Some(agent)
            })
            .map(|message| {
                let priority = self.priority_of(&message);
                InboxMessage { message, priority }
            })
            .collect();
        Ok(inbox)
    }

    fn priority_of(&self, message: &Message) -> Priority {
        if message.mentions.len() >= 2 {
            return Priority::High;
        }
        let content = message.content.to_lowercase();
        if self.urgency_keywords.iter().any(|k| content.contains(k)) {
            Priority::High
        } else {
            Priority::Normal
        }
    }

    /// Acknowledge the agent's inbox up to `until`.
    ///
    /// Overwrites the cursor unconditionally; no monotonicity check is
    /// performed, so a caller passing a timestamp earlier than the current
    /// cursor makes already-read messages unread again. Callers are
    /// responsible for passing a timestamp at or after the current cursor.
    pub async fn ack_inbox(&self, agent: &str, until: impl Into<String>) -> ContextResult<()> {
        let until = until.into();
        let mut cursors = self.cursors().await?;
        cursors.insert(agent.to_string(), until.clone());
        let text = serde_json::to_string(&cursors)?;
        self.storage.write(CURSORS_KEY, &text).await?;

        debug!(agent, until = %until, "Acknowledged inbox");
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::InboxAcknowledged {
                agent: agent.to_string(),
                until,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn document_key(&self, name: Option<&str>) -> String {
        let name = name.unwrap_or(&self.default_document);
        format!("{DOCUMENT_PREFIX}{name}")
    }

    /// Read a document, or `None` if it does not exist.
    pub async fn read_document(&self, name: Option<&str>) -> ContextResult<Option<String>> {
        Ok(self.storage.read(&self.document_key(name)).await?)
    }

    /// Create a document; fails if it already exists.
    pub async fn create_document(&self, name: Option<&str>, content: &str) -> ContextResult<()> {
        let key = self.document_key(name);
        if self.storage.exists(&key).await? {
            let name = name.unwrap_or(&self.default_document).to_string();
            return Err(ContextError::DocumentAlreadyExists(name));
        }
        self.storage.write(&key, content).await?;
        Ok(())
    }

    /// Overwrite a document, creating it if absent.
    pub async fn write_document(&self, name: Option<&str>, content: &str) -> ContextResult<()> {
        self.storage.write(&self.document_key(name), content).await?;
        Ok(())
    }

    /// Append to a document, creating it if absent.
    pub async fn append_document(&self, name: Option<&str>, content: &str) -> ContextResult<()> {
        self.storage
            .append(&self.document_key(name), content)
            .await?;
        Ok(())
    }

    /// List document names.
    pub async fn list_documents(&self) -> ContextResult<Vec<String>> {
        Ok(self.storage.list(DOCUMENT_PREFIX).await?)
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Store a read-only resource blob and return its reference.
    pub async fn create_resource(
        &self,
        content: &str,
        created_by: &str,
        kind: ResourceKind,
    ) -> ContextResult<ResourceRef> {
        let id = Uuid::new_v4().simple().to_string();
        let key = format!("{RESOURCE_PREFIX}{id}.{}", kind.suffix());
        self.storage.write(&key, content).await?;

        debug!(id = %id, created_by, kind = ?kind, "Created resource");
        Ok(ResourceRef {
            reference: format!("resource:{id}"),
            id,
        })
    }

    /// Read a resource by bare id, probing the known suffixes in order.
    pub async fn read_resource(&self, id: &str) -> ContextResult<String> {
        for kind in ResourceKind::PROBE_ORDER {
            let key = format!("{RESOURCE_PREFIX}{id}.{}", kind.suffix());
            if let Some(content) = self.storage.read(&key).await? {
                return Ok(content);
            }
        }
        Err(ContextError::ResourceNotFound(id.to_string()))
    }
}
