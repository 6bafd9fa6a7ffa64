// tests/cursor_store.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use feedgram::cursor::{CursorState, CursorStore};
use feedgram::error::StorageError;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct DemoCursor {
    last_id: Option<String>,
}

impl CursorState for DemoCursor {
    const KIND: &'static str = "demo";
}

#[tokio::test]
async fn missing_cursor_loads_as_initial() {
    let dir = tempfile::tempdir().unwrap();
    let store = CursorStore::new(dir.path());

    let cursor = store.load::<DemoCursor>().await.unwrap();
    assert_eq!(cursor, DemoCursor::default());
}

#[tokio::test]
async fn stored_cursor_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let store = CursorStore::new(dir.path());

    let cursor = DemoCursor {
        last_id: Some("abc".to_string()),
    };
    store.store(&cursor).await.unwrap();

    let loaded = store.load::<DemoCursor>().await.unwrap();
    assert_eq!(loaded, cursor);

    // No temp file debris after an atomic write.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[tokio::test]
async fn cursor_survives_a_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = CursorStore::new(dir.path());
        store
            .store(&DemoCursor {
                last_id: Some("x".to_string()),
            })
            .await
            .unwrap();
    }

    let store = CursorStore::new(dir.path());
    let loaded = store.load::<DemoCursor>().await.unwrap();
    assert_eq!(loaded.last_id.as_deref(), Some("x"));
}

#[tokio::test]
async fn concurrent_loads_share_one_slot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CursorStore::new(dir.path()));
    store
        .store(&DemoCursor {
            last_id: Some("shared".to_string()),
        })
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.load::<DemoCursor>().await.unwrap() })
        })
        .collect();

    for task in tasks {
        let cursor = task.await.unwrap();
        assert_eq!(cursor.last_id.as_deref(), Some("shared"));
    }

    // The store still works after the burst.
    store
        .store(&DemoCursor {
            last_id: Some("after".to_string()),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn close_is_idempotent_and_rejects_later_access() {
    let dir = tempfile::tempdir().unwrap();
    let store = CursorStore::new(dir.path());

    store.close().await;
    store.close().await;

    assert!(matches!(
        store.load::<DemoCursor>().await,
        Err(StorageError::Closed)
    ));
    assert!(matches!(
        store.store(&DemoCursor::default()).await,
        Err(StorageError::Closed)
    ));
}

#[tokio::test]
async fn corrupt_cursor_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo.json"), b"not json").unwrap();

    let store = CursorStore::new(dir.path());
    assert!(matches!(
        store.load::<DemoCursor>().await,
        Err(StorageError::Decode { kind: "demo", .. })
    ));
}
