//! Adapter behaviour through the object store port

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use core_kernel::ConversationId;
use domain_claims::{
    ClaimDraft, ObjectStorePort, Persist, PersistConfig, PersistStatus, StorageTarget,
};
use infra_storage::{build_store, StorageConfig};

fn draft() -> ClaimDraft {
    serde_json::from_value(json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})).unwrap()
}

async fn round_trip(store: Arc<dyn ObjectStorePort>) {
    let persist = Persist::new(store.clone(), PersistConfig::default());
    let target = StorageTarget::new("claims-intake");
    let key = target.resolve_key(&ConversationId::new_v7());

    let outcome = persist.save("claims-intake", &key, &draft()).await;
    assert_eq!(outcome.status, PersistStatus::Success, "{}", outcome.message);
    assert!(outcome.message.starts_with("Successfully saved to "));
    assert!(outcome.message.ends_with(&key));

    let bytes = store.get_object("claims-intake", &key, None).await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("\n  \"Name\": \"Corey Maher\""));
    let saved: ClaimDraft = serde_json::from_str(&text).unwrap();
    assert_eq!(saved, draft());
}

#[tokio::test]
async fn test_memory_round_trip() {
    let store = build_store(&StorageConfig::memory(["claims-intake"])).await.unwrap();
    round_trip(store).await;
}

#[tokio::test]
async fn test_filesystem_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::filesystem(dir.path()).with_buckets(["claims-intake"]);
    let store = build_store(&config).await.unwrap();
    round_trip(store).await;
}

#[tokio::test]
async fn test_failed_save_leaves_bucket_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::filesystem(dir.path()).with_buckets(["claims-intake"]);
    let store = build_store(&config).await.unwrap();
    let persist = Persist::new(store.clone(), PersistConfig::default());

    let outcome = persist.save("claims-intake", "../escape.json", &draft()).await;
    assert_eq!(outcome.status, PersistStatus::Error);
    assert!(outcome.message.contains("escape.json"));

    let outcome = persist.save("missing-bucket", "a.json", &draft()).await;
    assert_eq!(outcome.status, PersistStatus::Error);

    let entries = std::fs::read_dir(dir.path().join("claims-intake")).unwrap().count();
    assert_eq!(entries, 0);
}
