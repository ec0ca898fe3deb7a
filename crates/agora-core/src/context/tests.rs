use std::sync::Arc;

use agora_store::{FileStorage, MemoryStorage, StorageBackend};
use tempfile::TempDir;

use super::*;
use crate::config::CoordinationConfig;

fn config() -> CoordinationConfig {
    CoordinationConfig::new(["planner", "builder", "reviewer"])
}

fn provider() -> ContextProvider {
    ContextProvider::new(Arc::new(MemoryStorage::new()), &config())
}

#[tokio::test]
async fn timestamps_strictly_increase_back_to_back() {
    let provider = provider();
    let mut previous = String::new();
    for i in 0..50 {
        let message = provider
            .append_channel("planner", format!("message {i}"), AppendOptions::new())
            .await
            .unwrap();
        assert!(
            message.timestamp > previous,
            "timestamp {} not after {}",
            message.timestamp,
            previous
        );
        previous = message.timestamp;
    }
}

#[tokio::test]
async fn mentions_are_extracted_in_first_occurrence_order() {
    let provider = provider();
    let message = provider
        .append_channel(
            "ops",
            "@builder start after @planner finishes, @builder",
            AppendOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(message.mentions, vec!["builder", "planner"]);
}

#[tokio::test]
async fn get_inbox_is_idempotent() {
    let provider = provider();
    provider
        .append_channel("planner", "@builder task one", AppendOptions::new())
        .await
        .unwrap();
    provider
        .append_channel("planner", "@builder task two", AppendOptions::new())
        .await
        .unwrap();

    let first = provider.get_inbox("builder").await.unwrap();
    let second = provider.get_inbox("builder").await.unwrap();

    assert_eq!(first.len(), 2);
    let ts = |batch: &[InboxMessage]| {
        batch
            .iter()
            .map(|m| m.message.timestamp.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ts(&first), ts(&second));
}

#[tokio::test]
async fn ack_excludes_older_and_keeps_newer() {
    let provider = provider();
    let first = provider
        .append_channel("planner", "@builder old", AppendOptions::new())
        .await
        .unwrap();
    let second = provider
        .append_channel("planner", "@builder new", AppendOptions::new())
        .await
        .unwrap();

    provider.ack_inbox("builder", &first.timestamp).await.unwrap();

    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message.timestamp, second.timestamp);

    provider
        .ack_inbox("builder", &second.timestamp)
        .await
        .unwrap();
    assert!(provider.get_inbox("builder").await.unwrap().is_empty());
}

#[tokio::test]
async fn ack_overwrites_without_monotonicity_check() {
    let provider = provider();
    let first = provider
        .append_channel("planner", "@builder one", AppendOptions::new())
        .await
        .unwrap();
    let second = provider
        .append_channel("planner", "@builder two", AppendOptions::new())
        .await
        .unwrap();

    provider
        .ack_inbox("builder", &second.timestamp)
        .await
        .unwrap();
    assert!(provider.get_inbox("builder").await.unwrap().is_empty());

    // Rewinding the cursor resurrects the later message.
    provider.ack_inbox("builder", &first.timestamp).await.unwrap();
    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message.timestamp, second.timestamp);
}

#[tokio::test]
async fn inbox_excludes_log_and_self_authored_entries() {
    let provider = provider();
    provider
        .append_channel("builder", "@builder note to self", AppendOptions::new())
        .await
        .unwrap();
    provider
        .append_channel("ops", "@builder hidden", AppendOptions::new().log())
        .await
        .unwrap();
    provider
        .append_channel("planner", "@builder visible", AppendOptions::new())
        .await
        .unwrap();

    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message.content, "@builder visible");
}

#[tokio::test]
async fn direct_message_reaches_inbox_without_mention() {
    let provider = provider();
    provider
        .append_channel("planner", "for your eyes", AppendOptions::new().to("builder"))
        .await
        .unwrap();

    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 1);

    assert!(provider.get_inbox("reviewer").await.unwrap().is_empty());
}

#[tokio::test]
async fn direct_message_visibility_in_channel_reads() {
    let provider = provider();
    provider
        .append_channel("planner", "secret", AppendOptions::new().to("builder"))
        .await
        .unwrap();

    let for_sender = provider
        .read_channel(ChannelFilter::all().for_agent("planner"))
        .await
        .unwrap();
    let for_recipient = provider
        .read_channel(ChannelFilter::all().for_agent("builder"))
        .await
        .unwrap();
    let for_third_party = provider
        .read_channel(ChannelFilter::all().for_agent("reviewer"))
        .await
        .unwrap();

    assert_eq!(for_sender.len(), 1);
    assert_eq!(for_recipient.len(), 1);
    assert!(for_third_party.is_empty());
}

#[tokio::test]
async fn unfiltered_read_sees_everything() {
    let provider = provider();
    provider
        .append_channel("planner", "secret", AppendOptions::new().to("builder"))
        .await
        .unwrap();
    provider
        .append_channel("ops", "run marker", AppendOptions::new().log())
        .await
        .unwrap();

    let all = provider.read_channel(ChannelFilter::all()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn since_is_exclusive_and_limit_keeps_latest() {
    let provider = provider();
    let mut timestamps = Vec::new();
    for i in 0..5 {
        let m = provider
            .append_channel("planner", format!("m{i}"), AppendOptions::new())
            .await
            .unwrap();
        timestamps.push(m.timestamp);
    }

    let after_second = provider
        .read_channel(ChannelFilter::all().since(&timestamps[1]))
        .await
        .unwrap();
    assert_eq!(after_second.len(), 3);
    assert_eq!(after_second[0].timestamp, timestamps[2]);

    let last_two = provider
        .read_channel(ChannelFilter::all().limit(2))
        .await
        .unwrap();
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].timestamp, timestamps[3]);
    assert_eq!(last_two[1].timestamp, timestamps[4]);
}

#[tokio::test]
async fn priority_rules() {
    let provider = provider();
    provider
        .append_channel("planner", "@builder routine check", AppendOptions::new())
        .await
        .unwrap();
    provider
        .append_channel("planner", "@builder @reviewer sync up", AppendOptions::new())
        .await
        .unwrap();
    provider
        .append_channel("planner", "@builder this is URGENT", AppendOptions::new())
        .await
        .unwrap();

    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 3);
    assert_eq!(inbox[0].priority, Priority::Normal);
    assert_eq!(inbox[1].priority, Priority::High, "two mentions");
    assert_eq!(inbox[2].priority, Priority::High, "urgency keyword");
}

#[tokio::test]
async fn documents_create_write_append_list() {
    let provider = provider();

    provider.create_document(Some("plan"), "v1").await.unwrap();
    let err = provider.create_document(Some("plan"), "v2").await.unwrap_err();
    assert!(matches!(err, ContextError::DocumentAlreadyExists(name) if name == "plan"));

    provider.append_document(Some("plan"), "\nv2").await.unwrap();
    assert_eq!(
        provider.read_document(Some("plan")).await.unwrap().as_deref(),
        Some("v1\nv2")
    );

    // Default document name applies when omitted.
    provider.write_document(None, "shared state").await.unwrap();
    assert_eq!(
        provider.read_document(None).await.unwrap().as_deref(),
        Some("shared state")
    );

    let names = provider.list_documents().await.unwrap();
    assert_eq!(names, vec!["main", "plan"]);
}

#[tokio::test]
async fn resources_round_trip_and_probe_suffixes() {
    let provider = provider();

    let text = provider
        .create_resource("hello", "planner", ResourceKind::Text)
        .await
        .unwrap();
    assert_eq!(text.reference, format!("resource:{}", text.id));
    assert_eq!(provider.read_resource(&text.id).await.unwrap(), "hello");

    let json = provider
        .create_resource("{\"k\":1}", "planner", ResourceKind::Json)
        .await
        .unwrap();
    assert_eq!(provider.read_resource(&json.id).await.unwrap(), "{\"k\":1}");

    let err = provider.read_resource("does-not-exist").await.unwrap_err();
    assert!(matches!(err, ContextError::ResourceNotFound(_)));
}

#[tokio::test]
async fn file_backed_storage_behaves_identically() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn StorageBackend> = Arc::new(FileStorage::new(dir.path()));
    let provider = ContextProvider::new(storage, &config());

    let first = provider
        .append_channel("planner", "@builder persisted", AppendOptions::new())
        .await
        .unwrap();
    provider
        .append_channel("planner", "@builder again", AppendOptions::new())
        .await
        .unwrap();

    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 2);

    provider.ack_inbox("builder", &first.timestamp).await.unwrap();
    let inbox = provider.get_inbox("builder").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message.content, "@builder again");
}
