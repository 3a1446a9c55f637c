mod common;

use common::{SwitchableClient, boot};
use farmsync_lib::{
    AppConfig, AppError, CacheKey, EntityType, MutationDraft, MutationStore, MutationType,
    OfflineSyncServiceTrait, ReactiveCache, SqliteMutationStore, StorageStatus, TempId,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn batch_key() -> CacheKey {
    CacheKey::for_entity_type(&EntityType::new("batch".into()).unwrap())
}

fn create_batch(name: &str) -> (MutationDraft, String) {
    let entity_type = EntityType::new("batch".into()).unwrap();
    let temp_id = TempId::for_entity(&entity_type).to_string();
    let draft = MutationDraft::new(
        MutationType::Create,
        &entity_type,
        &temp_id,
        json!({"name": name, "startDate": "2024-03-01T08:30:00.045Z"}),
    );
    (draft, temp_id)
}

#[tokio::test]
async fn queued_work_survives_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let config = AppConfig::default();

    let (draft, temp_id) = create_batch("Broilers");
    {
        let client = Arc::new(SwitchableClient::offline());
        let app = boot(&path, client.clone(), 0, &config).await;
        app.service.enqueue(draft).await.unwrap();
        app.service
            .enqueue(MutationDraft::new(
                MutationType::Update,
                &EntityType::new("batch".into()).unwrap(),
                &temp_id,
                json!({"name": "Broilers (house 2)"}),
            ))
            .await
            .unwrap();

        let report = app.service.drain_queue().await.unwrap();
        assert_eq!(report.pending_count(), 2);
        assert_eq!(client.calls(), 1);
        app.pool.close().await;
    }

    let client = Arc::new(SwitchableClient::default());
    let app = boot(&path, client.clone(), 0, &config).await;
    assert!(app.cache.get(&batch_key()).await.is_none());

    let queued = app.service.pending_mutations().await.unwrap();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].retry_count, 1);
    assert_eq!(queued[1].retry_count, 0);

    assert_eq!(app.service.rehydrate().await.unwrap(), 2);
    let cached = app.cache.get(&batch_key()).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, temp_id);
    assert!(cached[0].is_optimistic);
    assert_eq!(cached[0].fields.get("name"), Some(&json!("Broilers (house 2)")));

    let report = app.service.drain_queue().await.unwrap();
    assert_eq!(report.synced_count(), 2);
    let cached = app.cache.get(&batch_key()).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, "srv-1");
    assert!(!cached[0].is_optimistic);
    assert!(cached[0].temp_id.is_none());
    assert!(!app.service.is_cache_stale(&batch_key()).await.unwrap());
}

#[tokio::test]
async fn sequence_keeps_climbing_across_restarts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let config = AppConfig::default();

    let first_sequence = {
        let app = boot(&path, Arc::new(SwitchableClient::default()), 0, &config).await;
        let (draft, _) = create_batch("Layers");
        app.service.enqueue(draft).await.unwrap();
        let sequence = app.service.pending_mutations().await.unwrap()[0].sequence;
        app.service.drain_queue().await.unwrap();
        app.pool.close().await;
        sequence
    };

    let app = boot(&path, Arc::new(SwitchableClient::default()), 0, &config).await;
    let store = SqliteMutationStore::new(app.pool.get_pool().clone());
    assert!(store.list_pending().await.unwrap().is_empty());

    let (draft, _) = create_batch("Layers 2");
    app.service.enqueue(draft).await.unwrap();
    let queued = app.service.pending_mutations().await.unwrap();
    assert!(queued[0].sequence > first_sequence);
}

#[tokio::test]
async fn nearly_full_storage_refuses_new_mutations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let mut config = AppConfig::default();
    config.storage.warning_percent = 60.0;
    config.storage.critical_percent = 80.0;
    config.storage.blocked_percent = 95.0;
    config.storage.quota_bytes = 100;

    let client = Arc::new(SwitchableClient::default());
    let app = boot(&path, client.clone(), 96, &config).await;
    assert_eq!(
        app.service.storage_status().await.unwrap(),
        StorageStatus::Blocked
    );
    assert!(!app.service.can_queue_mutation().await.unwrap());

    let (draft, _) = create_batch("Broilers");
    let result = app.service.enqueue(draft).await;
    assert!(matches!(result, Err(AppError::StorageExhausted(_))));
    assert!(app.cache.get(&batch_key()).await.is_none());
    assert!(app.service.pending_mutations().await.unwrap().is_empty());
    assert_eq!(client.calls(), 0);
}
