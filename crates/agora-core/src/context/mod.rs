//! Context Provider - shared cross-agent state
//!
//! Single source of truth for everything agents can see of each other:
//! - the append-only channel with mention extraction and visibility rules
//! - per-agent inboxes derived from the channel by cursor comparison
//! - shared documents and content-addressed resources
//!
//! Built entirely on `agora_store::StorageBackend`; the provider owns the
//! key layout and record shapes, never file formats.

/// @mention extraction against the known agent set.
pub mod mentions;
/// The provider itself: channel, inboxes, documents, resources.
pub mod provider;
/// Message, inbox, document, and resource type definitions.
pub mod types;

pub use provider::ContextProvider;
pub use types::{
    AppendOptions, ChannelFilter, ContextError, InboxMessage, Message, MessageKind, Priority,
    ResourceKind, ResourceRef,
};

#[cfg(test)]
mod tests;
