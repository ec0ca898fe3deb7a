//! Proposals - quorum-based group decisions
//!
//! Turns a set of independent votes into a single decision under
//! configurable rules (plurality/majority/unanimity, quorum, tie-breaking),
//! without losing the ability to recover from disagreement: a voter may
//! change its vote at any time before resolution, and that overwrite is the
//! mechanism that breaks deadlocks.

/// Proposal lifecycle, voting, and resolution.
pub mod manager;
/// Proposal type definitions and errors.
pub mod types;

pub use manager::ProposalManager;
pub use types::{
    Proposal, ProposalError, ProposalKind, ProposalOption, ProposalResult, ProposalSpec,
    ProposalStatus, ResolutionKind, ResolutionRule, ResolvedBy, TieBreaker,
};

#[cfg(test)]
mod tests;
