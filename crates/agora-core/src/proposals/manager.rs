use std::collections::HashMap;
use std::sync::Arc;

use agora_store::StorageBackend;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{
    Proposal, ProposalError, ProposalKind, ProposalOption, ProposalSpec, ProposalStatus,
    ResolutionKind, ResolvedBy, TieBreaker,
};
use crate::config::CoordinationConfig;
use crate::events::{CoordinationEvent, EventBus};

/// Storage key of the proposal working set
const PROPOSALS_KEY: &str = "proposals/active";

/// Persisted working set: active proposals plus the id counter.
///
/// Terminal proposals are dropped from the snapshot; the counter is kept
/// separately so ids are never reused even after every proposal in a
/// session has resolved.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    proposals: Vec<Proposal>,
}

struct ManagerState {
    next_id: u64,
    proposals: HashMap<String, Proposal>,
}

/// Manager for group proposals and their quorum resolution.
pub struct ProposalManager {
    storage: Arc<dyn StorageBackend>,
    agents: Vec<String>,
    default_timeout_secs: i64,
    state: RwLock<ManagerState>,
    events: Option<EventBus>,
}

impl ProposalManager {
    /// Load the manager from storage, recovering the active working set and
    /// the persisted id counter.
    pub async fn load(
        storage: Arc<dyn StorageBackend>,
        config: &CoordinationConfig,
    ) -> Result<Self, ProposalError> {
        let state = match storage.read(PROPOSALS_KEY).await? {
            Some(text) => match serde_json::from_str::<Snapshot>(&text) {
                Ok(snapshot) => ManagerState {
                    next_id: snapshot.next_id,
                    proposals: snapshot
                        .proposals
                        .into_iter()
                        .map(|p| (p.id.clone(), p))
                        .collect(),
                },
                Err(e) => {
                    warn!(error = %e, "Proposal snapshot unparseable; starting fresh");
                    ManagerState {
                        next_id: 1,
                        proposals: HashMap::new(),
                    }
                }
            },
            None => ManagerState {
                next_id: 1,
                proposals: HashMap::new(),
            },
        };

        Ok(Self {
            storage,
            agents: config.agents.clone(),
            default_timeout_secs: config.proposal_timeout_secs,
            state: RwLock::new(state),
            events: None,
        })
    }

    /// Attach an event bus; the manager publishes `ProposalCreated` and
    /// `ProposalClosed` events on it.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Create a proposal and return it.
    ///
    /// `Approval` proposals default to approve/reject options when none are
    /// given; every other kind requires at least one option.
    pub async fn create(&self, spec: ProposalSpec) -> Result<Proposal, ProposalError> {
        let options = if spec.options.is_empty() {
            if spec.kind == ProposalKind::Approval {
                vec![ProposalOption::new("approve"), ProposalOption::new("reject")]
            } else {
                return Err(ProposalError::MissingOptions);
            }
        } else {
            spec.options
        };

        let mut seen = std::collections::HashSet::new();
        for option in &options {
            if !seen.insert(option.id.as_str()) {
                return Err(ProposalError::DuplicateOption(option.id.clone()));
            }
        }

        let now = Utc::now();
        let timeout = spec.timeout_secs.unwrap_or(self.default_timeout_secs);

        let mut state = self.state.write().await;
        let proposal = Proposal {
            id: format!("prop-{}", state.next_id),
            kind: spec.kind,
            title: spec.title,
            description: spec.description,
            options,
            created_by: spec.created_by,
            created_at: now,
            expires_at: now + Duration::seconds(timeout),
            resolution: spec.resolution,
            binding: spec.binding,
            status: ProposalStatus::Active,
            result: Default::default(),
        };
        state.next_id += 1;
        state.proposals.insert(proposal.id.clone(), proposal.clone());
        self.persist(&state).await?;
        drop(state);

        info!(
            proposal = %proposal.id,
            kind = ?proposal.kind,
            created_by = %proposal.created_by,
            "Created proposal"
        );
        if let Some(bus) = &self.events {
            bus.publish(CoordinationEvent::ProposalCreated {
                proposal_id: proposal.id.clone(),
                created_by: proposal.created_by.clone(),
            });
        }
        Ok(proposal)
    }

    /// Cast (or change) a vote. On success the vote overwrites any prior
    /// vote from the same voter, counts are recomputed, and resolution is
    /// attempted. Returns the proposal as it stands after the vote.
    pub async fn vote(
        &self,
        proposal_id: &str,
        voter: &str,
        choice: &str,
        reason: Option<&str>,
    ) -> Result<Proposal, ProposalError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(proposal_id)
            .ok_or_else(|| ProposalError::NotFound(proposal_id.to_string()))?;

        if !proposal.is_active() {
            return Err(ProposalError::NotActive(proposal_id.to_string()));
        }
        if proposal.is_past_expiry(now) {
            Self::expire(proposal, now);
            let closed = proposal.clone();
            self.persist(&state).await?;
            self.publish_closed(&closed);
            return Err(ProposalError::Expired(proposal_id.to_string()));
        }
        if !self.agents.iter().any(|a| a == voter) {
            return Err(ProposalError::UnknownVoter(voter.to_string()));
        }
        if !proposal.has_option(choice) {
            return Err(ProposalError::InvalidChoice {
                proposal: proposal_id.to_string(),
                choice: choice.to_string(),
            });
        }

        proposal
            .result
            .votes
            .insert(voter.to_string(), choice.to_string());
        if let Some(reason) = reason {
            proposal
                .result
                .reasons
                .insert(voter.to_string(), reason.to_string());
        }
        Self::recount(proposal);
        debug!(proposal = %proposal_id, voter, choice, "Vote recorded");

        self.check_resolution(proposal, now);
        let updated = proposal.clone();
        self.persist(&state).await?;
        drop(state);

        if updated.status == ProposalStatus::Resolved {
            self.publish_closed(&updated);
        }
        Ok(updated)
    }

    /// Cancel an active proposal. Only the original creator may cancel.
    pub async fn cancel(
        &self,
        proposal_id: &str,
        cancelled_by: &str,
    ) -> Result<Proposal, ProposalError> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(proposal_id)
            .ok_or_else(|| ProposalError::NotFound(proposal_id.to_string()))?;

        if !proposal.is_active() {
            return Err(ProposalError::NotActive(proposal_id.to_string()));
        }
        if proposal.created_by != cancelled_by {
            return Err(ProposalError::NotCreator {
                proposal: proposal_id.to_string(),
                agent: cancelled_by.to_string(),
            });
        }

        proposal.status = ProposalStatus::Cancelled;
        proposal.result.resolved_at = Some(Utc::now());
        proposal.result.resolved_by = Some(ResolvedBy::Cancelled);
        let cancelled = proposal.clone();
        self.persist(&state).await?;
        drop(state);

        info!(proposal = %proposal_id, by = cancelled_by, "Cancelled proposal");
        self.publish_closed(&cancelled);
        Ok(cancelled)
    }

    /// Get a proposal by id, applying lazy expiration first.
    pub async fn get(&self, proposal_id: &str) -> Result<Proposal, ProposalError> {
        let mut state = self.state.write().await;
        self.expire_due_and_persist(&mut state).await?;
        state
            .proposals
            .get(proposal_id)
            .cloned()
            .ok_or_else(|| ProposalError::NotFound(proposal_id.to_string()))
    }

    /// List all proposals known to this manager instance (active plus
    /// terminal ones from this session), applying lazy expiration first.
    pub async fn list(&self) -> Result<Vec<Proposal>, ProposalError> {
        let mut state = self.state.write().await;
        self.expire_due_and_persist(&mut state).await?;
        let mut proposals: Vec<Proposal> = state.proposals.values().cloned().collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(proposals)
    }

    /// Whether any proposal is still active, applying lazy expiration first.
    pub async fn has_active_proposals(&self) -> Result<bool, ProposalError> {
        let mut state = self.state.write().await;
        self.expire_due_and_persist(&mut state).await?;
        Ok(state.proposals.values().any(Proposal::is_active))
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Recompute per-option counts from the vote map.
    fn recount(proposal: &mut Proposal) {
        proposal.result.counts = proposal
            .options
            .iter()
            .map(|option| {
                let count = proposal
                    .result
                    .votes
                    .values()
                    .filter(|choice| **choice == option.id)
                    .count();
                (option.id.clone(), count)
            })
            .collect();
    }

    /// Options with their counts, sorted by count descending. The sort is
    /// stable, so equal counts keep option declaration order and "first tied
    /// option in count-sorted order" is well defined.
    fn count_sorted(proposal: &Proposal) -> Vec<(String, usize)> {
        let mut sorted: Vec<(String, usize)> = proposal
            .options
            .iter()
            .map(|option| {
                let count = proposal
                    .result
                    .counts
                    .get(&option.id)
                    .copied()
                    .unwrap_or(0);
                (option.id.clone(), count)
            })
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }

    /// Pick a winner by the plurality sort/tie-break, or `None` when there
    /// are no votes or a `CreatorDecides` tie leaves the tally deadlocked.
    fn plurality_winner(proposal: &Proposal) -> Option<String> {
        let sorted = Self::count_sorted(proposal);
        let (top_option, top_count) = sorted.first()?.clone();
        if top_count == 0 {
            return None;
        }

        let tied: Vec<&String> = sorted
            .iter()
            .filter(|(_, count)| *count == top_count)
            .map(|(option, _)| option)
            .collect();
        if tied.len() <= 1 {
            return Some(top_option);
        }
        match proposal.resolution.tie_breaker {
            TieBreaker::First => Some(top_option),
            TieBreaker::Random => tied
                .choose(&mut rand::thread_rng())
                .map(|option| (*option).clone()),
            TieBreaker::CreatorDecides => None,
        }
    }

    /// Attempt resolution after a vote. Leaves the proposal active when
    /// quorum is unmet, the rule is unsatisfied, or a `CreatorDecides` tie
    /// stands (the overwrite rule lets a changed vote break it later).
    fn check_resolution(&self, proposal: &mut Proposal, now: DateTime<Utc>) {
        let votes_cast = proposal.result.votes.len();
        let quorum = proposal.resolution.quorum.unwrap_or(self.agents.len());
        if votes_cast < quorum {
            return;
        }

        let winner = match proposal.resolution.kind {
            ResolutionKind::Plurality => Self::plurality_winner(proposal),
            ResolutionKind::Majority => {
                let sorted = Self::count_sorted(proposal);
                match sorted.first() {
                    Some((option, count)) if *count * 2 > votes_cast => Some(option.clone()),
                    _ => None,
                }
            }
            ResolutionKind::Unanimous => {
                let mut choices = proposal.result.votes.values();
                match choices.next() {
                    Some(first) if choices.all(|c| c == first) => Some(first.clone()),
                    _ => None,
                }
            }
        };

        if let Some(winner) = winner {
            info!(proposal = %proposal.id, winner = %winner, "Proposal resolved");
            proposal.status = ProposalStatus::Resolved;
            proposal.result.winner = Some(winner);
            proposal.result.resolved_at = Some(now);
            proposal.result.resolved_by = Some(ResolvedBy::Quorum);
        }
    }

    /// Transition an overdue proposal to expired, still picking a winner
    /// from whatever votes exist so a timed-out vote with a clear leader is
    /// not left winner-less.
    fn expire(proposal: &mut Proposal, now: DateTime<Utc>) {
        debug!(proposal = %proposal.id, "Proposal expired");
        proposal.status = ProposalStatus::Expired;
        proposal.result.winner = Self::plurality_winner(proposal);
        proposal.result.resolved_at = Some(now);
        proposal.result.resolved_by = Some(ResolvedBy::Timeout);
    }

    /// Expire every overdue proposal, persisting and publishing when any
    /// transitioned. `publish` is synchronous and non-blocking, so it is
    /// safe under the state lock.
    async fn expire_due_and_persist(&self, state: &mut ManagerState) -> Result<(), ProposalError> {
        let now = Utc::now();
        let mut expired = Vec::new();
        for proposal in state.proposals.values_mut() {
            if proposal.is_past_expiry(now) {
                Self::expire(proposal, now);
                expired.push(proposal.clone());
            }
        }
        if expired.is_empty() {
            return Ok(());
        }
        self.persist(state).await?;
        for closed in &expired {
            self.publish_closed(closed);
        }
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the working set: active proposals plus the id counter.
    async fn persist(&self, state: &ManagerState) -> Result<(), ProposalError> {
        let mut active: Vec<Proposal> = state
            .proposals
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let snapshot = Snapshot {
            next_id: state.next_id,
            proposals: active,
        };
        let text = serde_json::to_string(&snapshot)?;
        self.storage.write(PROPOSALS_KEY, &text).await?;
        Ok(())
    }

    fn publish_closed(&self, proposal: &Proposal) {
        if let Some(bus) = &self.events {
            let status = match proposal.status {
                ProposalStatus::Resolved => "resolved",
                ProposalStatus::Expired => "expired",
                ProposalStatus::Cancelled => "cancelled",
                ProposalStatus::Active => return,
            };
            bus.publish(CoordinationEvent::ProposalClosed {
                proposal_id: proposal.id.clone(),
                status: status.to_string(),
                winner: proposal.result.winner.clone(),
            });
        }
    }
}
