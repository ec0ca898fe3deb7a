//! The backend boundary
//!
//! The controller never inspects how a backend obtains or formats its reply;
//! it only consumes the `RunOutcome` triple. Adapters that shell out to CLI
//! tools or HTTP APIs live behind this trait, outside this crate.

use super::types::{RunContext, RunOutcome};

/// An external agent backend.
///
/// `run` is a true blocking boundary at the system edge (an external process
/// or network call); the controller awaits it without holding any lock and
/// never invokes it concurrently for the same agent.
#[async_trait::async_trait]
pub trait AgentBackend: Send + Sync {
    /// Execute one run against the given context.
    async fn run(&self, context: RunContext) -> RunOutcome;
}
