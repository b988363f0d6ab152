//! Integration tests for SqliteStore
//!
//! Uses tempfile::TempDir for isolated on-disk databases, so several pooled
//! connections really contend for the SQLite write lock.

use chrono::Utc;
use lifeform_memory::SqliteStore;
use std::sync::Arc;

async fn setup_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    let db_path = dir.path().join("nested").join("lifeform.db");
    Arc::new(SqliteStore::new(&db_path).await.unwrap())
}

/// Test 1: concurrent inserts never produce two pending questions
#[tokio::test]
async fn test_concurrent_pending_inserts() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = setup_store(&dir).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.insert_pending_question(&format!("question {}", i), Utc::now())
                .await
        }));
    }

    let mut winners = 0;
    for h in handles {
        if h.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.count_pending_questions().await.unwrap(), 1);
    assert_eq!(store.count_questions().await.unwrap(), 1);
}

/// Test 2: concurrent guarded answers produce exactly one memory
#[tokio::test]
async fn test_concurrent_answers_single_winner() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = setup_store(&dir).await;
    let q = store
        .insert_pending_question("who answers first?", Utc::now())
        .await
        .unwrap()
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let s = store.clone();
        let id = q.id;
        handles.push(tokio::spawn(async move {
            let mut uow = s.begin().await?;
            match uow.answer_question(id).await? {
                Some(_) => {
                    uow.insert_memory(id, &format!("reply {}", i), Utc::now())
                        .await?;
                    uow.commit().await?;
                    Ok::<bool, anyhow::Error>(true)
                }
                None => {
                    uow.rollback().await?;
                    Ok(false)
                }
            }
        }));
    }

    let mut successes = 0;
    for h in handles {
        if h.await.unwrap().unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.count_memories().await.unwrap(), 1);
    assert_eq!(store.count_pending_questions().await.unwrap(), 0);
}

/// Test 3: data survives reopening the database file
#[tokio::test]
async fn test_persistence_roundtrip() {
    let dir = tempfile::TempDir::new().unwrap();
    let q_id = {
        let store = setup_store(&dir).await;
        store.ensure_lifeform().await.unwrap();
        store
            .insert_pending_question("remember me?", Utc::now())
            .await
            .unwrap()
            .unwrap()
            .id
    };

    let reopened = setup_store(&dir).await;
    let pending = reopened.pending_question().await.unwrap().unwrap();
    assert_eq!(pending.id, q_id);
    assert_eq!(pending.text, "remember me?");
    assert!(reopened.load_lifeform().await.unwrap().is_some());
}
