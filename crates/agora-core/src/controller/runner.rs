use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::AgentBackend;
use super::types::{
    CompletionCallback, ControllerConfig, ControllerError, ControllerState, RunContext, RunReport,
};
use crate::context::{ChannelFilter, ContextError, ContextProvider, InboxMessage};
use crate::events::{CoordinationEvent, EventBus};

/// Supervisory loop for one agent.
///
/// State machine: `Stopped → Idle ⇄ Running`, with `Stopped` reachable from
/// anywhere via `stop()`. There is no transition out of `Stopped` except
/// constructing a new controller.
pub struct AgentController {
    agent: String,
    provider: Arc<ContextProvider>,
    backend: Arc<dyn AgentBackend>,
    config: ControllerConfig,
    state: RwLock<ControllerState>,
    /// Wake slot; holds a sender only while the loop is genuinely waiting.
    /// Only one of {poll timer, wake signal} ever resolves a given wait.
    wake_slot: Mutex<Option<oneshot::Sender<()>>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    on_complete: Option<CompletionCallback>,
    events: Option<EventBus>,
}

impl AgentController {
    /// Create a controller for `agent`. It starts in `Stopped`.
    #[must_use]
    pub fn new(
        agent: impl Into<String>,
        provider: Arc<ContextProvider>,
        backend: Arc<dyn AgentBackend>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            agent: agent.into(),
            provider,
            backend,
            config,
            state: RwLock::new(ControllerState::Stopped),
            wake_slot: Mutex::new(None),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            started: AtomicBool::new(false),
            on_complete: None,
            events: None,
        }
    }

    /// Register a completion callback, invoked after each batch.
    #[must_use]
    pub fn with_callback(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Attach an event bus for run and state-change events.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// The agent this controller supervises.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    /// Start the supervisory loop as an independent task.
    ///
    /// Fails unless the controller is freshly constructed. An unexpected
    /// error inside the loop (a storage fault, not a backend failure) forces
    /// the controller to `Stopped` rather than retrying silently.
    pub async fn start(self: &Arc<Self>) -> Result<(), ControllerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::AlreadyStarted(self.agent.clone()));
        }
        self.set_state(ControllerState::Idle).await;

        let controller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = controller.run_loop().await {
                error!(agent = %controller.agent, error = %e, "Controller loop failed");
            }
            controller.set_state(ControllerState::Stopped).await;
            info!(agent = %controller.agent, "Controller stopped");
        });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Wake the controller out of its poll wait.
    ///
    /// Effective only while the loop is idle and genuinely waiting; the
    /// pending poll timer is abandoned and the inbox is checked immediately.
    /// A call while `Running` or `Stopped` is a no-op.
    pub async fn wake(&self) {
        if self.state().await != ControllerState::Idle {
            return;
        }
        if let Some(tx) = self.wake_slot.lock().await.take() {
            let _ = tx.send(());
            debug!(agent = %self.agent, "Wake signal delivered");
        }
    }

    /// Stop the controller.
    ///
    /// Safe to call at any point. Cancels the pending wait and releases a
    /// waiting wake slot so the loop observes the stop promptly; an
    /// in-flight backend run is not forcibly cancelled, and a stop arriving
    /// mid-retry is observed at the top of the next wait.
    pub async fn stop(&self) {
        info!(agent = %self.agent, "Stopping controller");
        self.cancel.cancel();
        self.wake_slot.lock().await.take();
        self.set_state(ControllerState::Stopped).await;
    }

    /// Wait for the loop task to exit. Call after `stop()`.
    pub async fn join(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn set_state(&self, new: ControllerState) {
        let mut state = self.state.write().await;
        if *state == new {
            return;
        }
        *state = new;
        drop(state);
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::ControllerStateChanged {
                agent: self.agent.clone(),
                state: new,
            });
        }
    }

    async fn run_loop(&self) -> Result<(), ContextError> {
        info!(agent = %self.agent, "Controller started");
        loop {
            let (tx, rx) = oneshot::channel::<()>();
            *self.wake_slot.lock().await = Some(tx);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                result = rx => {
                    if result.is_ok() {
                        debug!(agent = %self.agent, "Woken early");
                    }
                }
            }
            *self.wake_slot.lock().await = None;
            if self.cancel.is_cancelled() {
                break;
            }

            let inbox = self.provider.get_inbox(&self.agent).await?;
            if inbox.is_empty() {
                self.set_state(ControllerState::Idle).await;
                continue;
            }
            self.process_batch(inbox).await?;
            if !self.cancel.is_cancelled() {
                self.set_state(ControllerState::Idle).await;
            }
        }
        Ok(())
    }

    /// Run the backend over one inbox batch, retrying per the retry config.
    ///
    /// The inbox is acknowledged to the newest batched timestamp on success
    /// and after the final failed attempt alike: an unrecoverable message is
    /// discarded rather than retried forever on the next poll.
    async fn process_batch(&self, inbox: Vec<InboxMessage>) -> Result<(), ContextError> {
        let Some(newest) = inbox.last() else {
            return Ok(());
        };
        let ack_target = newest.message.timestamp.clone();
        info!(
            agent = %self.agent,
            batch = inbox.len(),
            until = %ack_target,
            "Processing inbox batch"
        );

        self.set_state(ControllerState::Running).await;
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::RunStarted {
                agent: self.agent.clone(),
                batch_size: inbox.len(),
            });
        }

        let started = Instant::now();
        let max_attempts = self.config.retry.max_attempts;
        let mut attempts = 0;
        let mut last_error = None;
        let mut success = false;

        while attempts < max_attempts {
            attempts += 1;
            let context = self.build_context(&inbox).await?;
            let outcome = self.backend.run(context).await;
            if outcome.success {
                if attempts > 1 {
                    debug!(agent = %self.agent, attempts, "Backend succeeded after retry");
                }
                success = true;
                break;
            }
            last_error = outcome.error;
            warn!(
                agent = %self.agent,
                attempt = attempts,
                max_attempts,
                error = ?last_error,
                "Backend run failed"
            );
            if attempts < max_attempts {
                tokio::time::sleep(self.config.retry.delay_for(attempts)).await;
            }
        }

        self.provider.ack_inbox(&self.agent, &ack_target).await?;
        if !success {
            warn!(
                agent = %self.agent,
                attempts,
                "Discarding batch after exhausting retries"
            );
        }

        let report = RunReport {
            agent: self.agent.clone(),
            success,
            attempts,
            error: if success { None } else { last_error },
            duration: started.elapsed(),
            acked_until: ack_target,
        };
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::RunCompleted {
                agent: report.agent.clone(),
                success: report.success,
                attempts: report.attempts,
            });
        }
        if let Some(callback) = &self.on_complete {
            callback(report);
        }
        Ok(())
    }

    async fn build_context(&self, inbox: &[InboxMessage]) -> Result<RunContext, ContextError> {
        let channel_window = self
            .provider
            .read_channel(
                ChannelFilter::all()
                    .for_agent(&self.agent)
                    .limit(self.config.channel_window),
            )
            .await?;
        let document = self.provider.read_document(None).await?;
        Ok(RunContext {
            agent: self.agent.clone(),
            inbox: inbox.to_vec(),
            channel_window,
            document,
        })
    }
}
