use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::monitor::WorkflowMonitor;
use crate::config::CoordinationConfig;
use crate::context::ContextProvider;
use crate::controller::{AgentController, ControllerError};
use crate::error::Result;
use crate::events::{CoordinationEvent, EventBus};
use crate::proposals::ProposalManager;

/// Runs a group of controllers as one workflow.
///
/// Starts and stops the controllers together, and routes `MessageAppended`
/// events into `wake()` calls so mentioned agents pick up new work without
/// waiting out their poll interval. The event bus must be the same one the
/// provider publishes on.
pub struct WorkflowRunner {
    controllers: Vec<Arc<AgentController>>,
    provider: Arc<ContextProvider>,
    proposals: Arc<ProposalManager>,
    events: EventBus,
    debounce: Duration,
    cancel: CancellationToken,
    wake_router: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowRunner {
    /// Create a runner over the given controllers.
    #[must_use]
    pub fn new(
        controllers: Vec<Arc<AgentController>>,
        provider: Arc<ContextProvider>,
        proposals: Arc<ProposalManager>,
        events: EventBus,
        config: &CoordinationConfig,
    ) -> Self {
        Self {
            controllers,
            provider,
            proposals,
            events,
            debounce: Duration::from_millis(config.idle_debounce_ms),
            cancel: CancellationToken::new(),
            wake_router: Mutex::new(None),
        }
    }

    /// The controllers this runner owns.
    #[must_use]
    pub fn controllers(&self) -> &[Arc<AgentController>] {
        &self.controllers
    }

    /// Build an idle monitor over this runner's controllers.
    #[must_use]
    pub fn monitor(&self) -> WorkflowMonitor {
        WorkflowMonitor::new(
            self.controllers.clone(),
            Arc::clone(&self.provider),
            Arc::clone(&self.proposals),
            self.debounce,
        )
    }

    /// Start every controller and the wake router.
    pub async fn start(&self) -> std::result::Result<(), ControllerError> {
        for controller in &self.controllers {
            controller.start().await?;
        }

        let mut rx = self.events.subscribe();
        let controllers = self.controllers.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(CoordinationEvent::MessageAppended { mentions, to, from, .. }) => {
                            for controller in &controllers {
                                let agent = controller.agent();
                                if agent == from {
                                    continue;
                                }
                                let targeted = mentions.iter().any(|m| m == agent)
                                    || to.as_deref() == Some(agent);
                                if targeted {
                                    debug!(agent, "Waking mentioned controller");
                                    controller.wake().await;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            debug!(missed, "Wake router lagged behind the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        *self.wake_router.lock().await = Some(handle);

        info!(controllers = self.controllers.len(), "Workflow started");
        Ok(())
    }

    /// Stop the wake router and every controller, waiting for their tasks
    /// to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.wake_router.lock().await.take() {
            let _ = handle.await;
        }
        for controller in &self.controllers {
            controller.stop().await;
        }
        for controller in &self.controllers {
            controller.join().await;
        }
        info!("Workflow stopped");
    }

    /// Wait until the workflow is (debounced) idle, giving up after
    /// `timeout`.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<bool> {
        self.monitor().wait_until_idle(self.debounce, timeout).await
    }
}
