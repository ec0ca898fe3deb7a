//! Error types for agora-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] agora_store::StorageError),

    /// Channel/inbox/document/resource operation failure
    #[error("context error: {0}")]
    Context(#[from] crate::context::ContextError),

    /// Proposal lifecycle or voting failure
    #[error("proposal error: {0}")]
    Proposal(#[from] crate::proposals::ProposalError),

    /// Controller state machine failure
    #[error("controller error: {0}")]
    Controller(#[from] crate::controller::ControllerError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
