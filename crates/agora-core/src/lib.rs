//! Agora Core - Multi-agent coordination engine
//!
//! This crate provides the coordination substrate that lets several
//! independent AI-agent processes collaborate on a shared task:
//! - Context: shared channel, per-agent inboxes, documents, resources
//! - Proposals: quorum-based group decision making
//! - Controller: per-agent supervisory loop (poll/wake, retry, ack)
//! - Workflow: controller group management and idle detection
//! - Events: broadcast bus for coordination events
//!
//! Storage is delegated to `agora-store`; the coordination layer never has
//! file-format knowledge beyond its own record shapes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod proposals;
pub mod retry;
pub mod workflow;

pub use config::{ConfigError, CoordinationConfig};
pub use context::{
    AppendOptions, ChannelFilter, ContextError, ContextProvider, InboxMessage, Message,
    MessageKind, Priority, ResourceKind, ResourceRef,
};
pub use controller::{
    AgentBackend, AgentController, CompletionCallback, ControllerConfig, ControllerError,
    ControllerState, RunContext, RunOutcome, RunReport,
};
pub use error::{Error, Result};
pub use events::{CoordinationEvent, EventBus};
pub use proposals::{
    Proposal, ProposalError, ProposalKind, ProposalManager, ProposalOption, ProposalResult,
    ProposalSpec, ProposalStatus, ResolutionKind, ResolutionRule, ResolvedBy, TieBreaker,
};
pub use retry::RetryConfig;
pub use workflow::{WorkflowMonitor, WorkflowRunner};
