use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::controller::{AgentController, ControllerState};
use crate::context::ContextProvider;
use crate::error::Result;
use crate::proposals::ProposalManager;

/// Idle detector for a group of controllers.
///
/// Pure aggregation over the controllers, the provider, and the proposal
/// manager; owns no state of its own.
pub struct WorkflowMonitor {
    controllers: Vec<Arc<AgentController>>,
    provider: Arc<ContextProvider>,
    proposals: Arc<ProposalManager>,
    debounce: Duration,
}

impl WorkflowMonitor {
    /// Create a monitor over the given controllers.
    #[must_use]
    pub fn new(
        controllers: Vec<Arc<AgentController>>,
        provider: Arc<ContextProvider>,
        proposals: Arc<ProposalManager>,
        debounce: Duration,
    ) -> Self {
        Self {
            controllers,
            provider,
            proposals,
            debounce,
        }
    }

    /// Instantaneous check: every controller idle, every inbox empty, no
    /// active proposal. No debounce applied.
    pub async fn is_quiescent(&self) -> Result<bool> {
        for controller in &self.controllers {
            if controller.state().await != ControllerState::Idle {
                return Ok(false);
            }
        }
        for agent in self.provider.known_agents() {
            if !self.provider.get_inbox(agent).await?.is_empty() {
                return Ok(false);
            }
        }
        if self.proposals.has_active_proposals().await? {
            return Ok(false);
        }
        Ok(true)
    }

    /// Debounced check: quiescent now and still quiescent after the debounce
    /// delay. A reply that lands between the two checks keeps the workflow
    /// alive.
    pub async fn check_idle(&self) -> Result<bool> {
        if !self.is_quiescent().await? {
            return Ok(false);
        }
        tokio::time::sleep(self.debounce).await;
        self.is_quiescent().await
    }

    /// Wait until the workflow is (debounced) idle, re-checking every
    /// `poll`, giving up after `timeout`. Returns whether idle was reached.
    pub async fn wait_until_idle(&self, poll: Duration, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.check_idle().await? {
                debug!("Workflow is idle");
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(poll).await;
        }
    }
}
