use std::sync::Arc;

use agora_store::{MemoryStorage, StorageBackend};

use super::*;
use crate::config::CoordinationConfig;

fn config() -> CoordinationConfig {
    CoordinationConfig::new(["ana", "ben", "cyn"])
}

async fn manager() -> (ProposalManager, Arc<dyn StorageBackend>) {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let manager = ProposalManager::load(storage.clone(), &config()).await.unwrap();
    (manager, storage)
}

fn decision(title: &str, options: &[&str], created_by: &str) -> ProposalSpec {
    ProposalSpec::new(ProposalKind::Decision, title, created_by)
        .with_options(options.iter().map(|o| ProposalOption::new(*o)))
}

#[tokio::test]
async fn approval_defaults_to_approve_reject() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            ProposalSpec::new(ProposalKind::Approval, "ship it?", "ana")
                .with_description("release 0.1.0 to the registry")
                .binding(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = proposal.options.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["approve", "reject"]);
    assert_eq!(proposal.id, "prop-1");
    assert_eq!(proposal.status, ProposalStatus::Active);
    assert!(proposal.binding);
    assert_eq!(
        proposal.description.as_deref(),
        Some("release 0.1.0 to the registry")
    );
}

#[tokio::test]
async fn non_approval_without_options_is_rejected() {
    let (manager, _) = manager().await;
    let err = manager
        .create(ProposalSpec::new(ProposalKind::Decision, "how?", "ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::MissingOptions));
}

#[tokio::test]
async fn duplicate_option_ids_are_rejected() {
    let (manager, _) = manager().await;
    let err = manager
        .create(decision("dup", &["x", "x"], "ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::DuplicateOption(id) if id == "x"));
}

#[tokio::test]
async fn vote_validation() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(decision("pick", &["x", "y"], "ana"))
        .await
        .unwrap();

    let err = manager.vote("prop-99", "ana", "x", None).await.unwrap_err();
    assert!(matches!(err, ProposalError::NotFound(_)));

    let err = manager
        .vote(&proposal.id, "stranger", "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::UnknownVoter(_)));

    let err = manager
        .vote(&proposal.id, "ana", "z", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::InvalidChoice { .. }));
}

#[tokio::test]
async fn plurality_resolves_at_quorum() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            decision("pick", &["x", "y"], "ana")
                .with_resolution(ResolutionRule::plurality().with_quorum(2)),
        )
        .await
        .unwrap();

    let after_one = manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    assert_eq!(after_one.status, ProposalStatus::Active, "below quorum");

    let after_two = manager.vote(&proposal.id, "ben", "x", None).await.unwrap();
    assert_eq!(after_two.status, ProposalStatus::Resolved);
    assert_eq!(after_two.result.winner.as_deref(), Some("x"));
    assert_eq!(after_two.result.resolved_by, Some(ResolvedBy::Quorum));
    assert!(after_two.result.resolved_at.is_some());
}

#[tokio::test]
async fn majority_three_way_split_never_resolves() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            decision("split", &["x", "y", "z"], "ana")
                .with_resolution(ResolutionRule::majority()),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    manager.vote(&proposal.id, "ben", "y", None).await.unwrap();
    let split = manager.vote(&proposal.id, "cyn", "z", None).await.unwrap();
    assert_eq!(split.status, ProposalStatus::Active, "3-way split holds");
    assert!(split.result.winner.is_none());

    // One voter changing its mind creates a majority and resolves at once.
    let resolved = manager.vote(&proposal.id, "cyn", "x", None).await.unwrap();
    assert_eq!(resolved.status, ProposalStatus::Resolved);
    assert_eq!(resolved.result.winner.as_deref(), Some("x"));
}

#[tokio::test]
async fn vote_overwrite_is_last_write_wins() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            decision("flip", &["x", "y"], "ana")
                .with_resolution(ResolutionRule::plurality().with_quorum(3)),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    let after = manager
        .vote(&proposal.id, "ana", "y", Some("changed my mind"))
        .await
        .unwrap();

    assert_eq!(after.result.votes.len(), 1);
    assert_eq!(after.result.votes.get("ana").map(String::as_str), Some("y"));
    assert_eq!(after.result.counts.get("x"), Some(&0));
    assert_eq!(after.result.counts.get("y"), Some(&1));
    assert_eq!(
        after.result.reasons.get("ana").map(String::as_str),
        Some("changed my mind")
    );
}

#[tokio::test]
async fn creator_decides_tie_stays_active_until_a_vote_changes() {
    let config = CoordinationConfig::new(["ana", "ben", "cyn", "dee"]);
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let manager = ProposalManager::load(storage, &config).await.unwrap();

    let proposal = manager
        .create(
            ProposalSpec::new(ProposalKind::Election, "lead?", "ana")
                .with_options([ProposalOption::new("x"), ProposalOption::new("y")])
                .with_resolution(
                    ResolutionRule::plurality().with_tie_breaker(TieBreaker::CreatorDecides),
                ),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    manager.vote(&proposal.id, "ben", "x", None).await.unwrap();
    manager.vote(&proposal.id, "cyn", "y", None).await.unwrap();
    let tied = manager.vote(&proposal.id, "dee", "y", None).await.unwrap();

    assert_eq!(tied.status, ProposalStatus::Active, "2-2 tie stands");
    assert!(tied.result.winner.is_none());

    let resolved = manager.vote(&proposal.id, "dee", "x", None).await.unwrap();
    assert_eq!(resolved.status, ProposalStatus::Resolved);
    assert_eq!(resolved.result.winner.as_deref(), Some("x"));
}

#[tokio::test]
async fn first_tie_breaker_picks_first_in_count_order() {
    let config = CoordinationConfig::new(["ana", "ben"]);
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let manager = ProposalManager::load(storage, &config).await.unwrap();

    let proposal = manager
        .create(
            ProposalSpec::new(ProposalKind::Decision, "tie", "ana")
                .with_options([ProposalOption::new("x"), ProposalOption::new("y")]),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    let resolved = manager.vote(&proposal.id, "ben", "y", None).await.unwrap();

    assert_eq!(resolved.status, ProposalStatus::Resolved);
    assert_eq!(resolved.result.winner.as_deref(), Some("x"));
}

#[tokio::test]
async fn unanimous_requires_every_vote_to_agree() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            decision("all in", &["x", "y"], "ana").with_resolution(ResolutionRule::unanimous()),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    manager.vote(&proposal.id, "ben", "x", None).await.unwrap();
    let disagreed = manager.vote(&proposal.id, "cyn", "y", None).await.unwrap();
    assert_eq!(disagreed.status, ProposalStatus::Active);

    let resolved = manager.vote(&proposal.id, "cyn", "x", None).await.unwrap();
    assert_eq!(resolved.status, ProposalStatus::Resolved);
    assert_eq!(resolved.result.winner.as_deref(), Some("x"));
}

#[tokio::test]
async fn voting_on_resolved_proposal_is_a_state_error() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(
            decision("done", &["x"], "ana")
                .with_resolution(ResolutionRule::plurality().with_quorum(1)),
        )
        .await
        .unwrap();

    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();
    let err = manager
        .vote(&proposal.id, "ben", "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::NotActive(_)));
}

#[tokio::test]
async fn vote_after_expiry_fails_and_expires_the_proposal() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(decision("late", &["x", "y"], "ana").with_timeout_secs(-1))
        .await
        .unwrap();

    let err = manager
        .vote(&proposal.id, "ana", "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProposalError::Expired(_)));

    let expired = manager.get(&proposal.id).await.unwrap();
    assert_eq!(expired.status, ProposalStatus::Expired);
    assert_eq!(expired.result.resolved_by, Some(ResolvedBy::Timeout));
    assert!(expired.result.winner.is_none(), "vote was rejected, none cast");
}

#[tokio::test]
async fn lazy_expiration_on_get_picks_leader_from_cast_votes() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(decision("soon", &["x", "y"], "ana").with_timeout_secs(1))
        .await
        .unwrap();
    manager.vote(&proposal.id, "ana", "x", None).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;

    let expired = manager.get(&proposal.id).await.unwrap();
    assert_eq!(expired.status, ProposalStatus::Expired);
    assert_eq!(expired.result.resolved_by, Some(ResolvedBy::Timeout));
    assert_eq!(expired.result.winner.as_deref(), Some("x"));
    assert!(!manager.has_active_proposals().await.unwrap());
}

#[tokio::test]
async fn cancel_is_creator_only_and_terminal() {
    let (manager, _) = manager().await;
    let proposal = manager
        .create(decision("maybe", &["x"], "ana"))
        .await
        .unwrap();

    let err = manager.cancel(&proposal.id, "ben").await.unwrap_err();
    assert!(matches!(err, ProposalError::NotCreator { .. }));

    let cancelled = manager.cancel(&proposal.id, "ana").await.unwrap();
    assert_eq!(cancelled.status, ProposalStatus::Cancelled);
    assert_eq!(cancelled.result.resolved_by, Some(ResolvedBy::Cancelled));

    let err = manager.cancel(&proposal.id, "ana").await.unwrap_err();
    assert!(matches!(err, ProposalError::NotActive(_)));
}

#[tokio::test]
async fn id_counter_survives_an_empty_working_set() {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let manager = ProposalManager::load(storage.clone(), &config()).await.unwrap();

    let quorum_one = ResolutionRule::plurality().with_quorum(1);
    let first = manager
        .create(decision("a", &["x"], "ana").with_resolution(quorum_one.clone()))
        .await
        .unwrap();
    let second = manager
        .create(decision("b", &["x"], "ana").with_resolution(quorum_one))
        .await
        .unwrap();
    assert_eq!(first.id, "prop-1");
    assert_eq!(second.id, "prop-2");

    manager.vote(&first.id, "ana", "x", None).await.unwrap();
    manager.vote(&second.id, "ana", "x", None).await.unwrap();

    // A fresh manager on the same storage sees no active proposals but must
    // not reuse ids.
    let reloaded = ProposalManager::load(storage, &config()).await.unwrap();
    assert!(!reloaded.has_active_proposals().await.unwrap());
    let third = reloaded.create(decision("c", &["x"], "ana")).await.unwrap();
    assert_eq!(third.id, "prop-3");
}

#[tokio::test]
async fn only_active_proposals_are_persisted() {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let manager = ProposalManager::load(storage.clone(), &config()).await.unwrap();

    let keep = manager.create(decision("keep", &["x"], "ana")).await.unwrap();
    let discard = manager.create(decision("drop", &["x"], "ana")).await.unwrap();
    manager.cancel(&discard.id, "ana").await.unwrap();

    let reloaded = ProposalManager::load(storage, &config()).await.unwrap();
    assert!(reloaded.get(&keep.id).await.is_ok());
    let err = reloaded.get(&discard.id).await.unwrap_err();
    assert!(matches!(err, ProposalError::NotFound(_)));
}
