use rand::Rng;

use zkpool_lib::{OrderBy, Task, TaskStatus};
use zkpool_taskdb::{InMemoryTaskStore, TaskStore};

async fn run_status_lifecycle(store: &dyn TaskStore) {
    let id = rand::thread_rng().gen_range(1..1_000_000u64);
    store
        .insert_task(Task::new(id, b"traces".to_vec()))
        .await
        .unwrap();

    for status in [
        TaskStatus::Assigned,
        TaskStatus::Proved,
        TaskStatus::Verified,
    ] {
        store.set_status(id, status).await.unwrap();
        let task = store.fetch_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.status, status);
    }

    // setting the same status twice is fine
    store.set_status(id, TaskStatus::Verified).await.unwrap();
}

async fn run_proof_content(store: &dyn TaskStore) {
    store
        .insert_task(Task::new(500, b"traces".to_vec()))
        .await
        .unwrap();
    store
        .set_proof(500, &[0xAA], &[0xBB], 12)
        .await
        .unwrap();

    let task = store.fetch_by_id(500).await.unwrap().unwrap();
    assert_eq!(task.proof.as_deref(), Some(&[0xAA][..]));
    assert_eq!(task.final_pair.as_deref(), Some(&[0xBB][..]));
    assert_eq!(task.proof_time_sec, Some(12));

    assert!(store.set_proof(999, &[], &[], 0).await.is_err());
}

async fn run_fetch_by_status(store: &dyn TaskStore) {
    for id in 1..=5u64 {
        store.insert_task(Task::new(id, vec![])).await.unwrap();
    }
    store.set_status(3, TaskStatus::Assigned).await.unwrap();

    let unassigned = store
        .fetch_by_status(TaskStatus::Unassigned, OrderBy::Asc, 10)
        .await
        .unwrap();
    assert_eq!(
        unassigned.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![1, 2, 4, 5]
    );

    let limited = store
        .fetch_by_status(TaskStatus::Unassigned, OrderBy::Desc, 2)
        .await
        .unwrap();
    assert_eq!(limited.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 4]);
}

async fn run_crash_recovery(store: &dyn TaskStore) {
    for id in 10..13u64 {
        store.insert_task(Task::new(id, vec![])).await.unwrap();
        store.set_status(id, TaskStatus::Assigned).await.unwrap();
    }
    store.set_status(12, TaskStatus::Verified).await.unwrap();

    assert_eq!(store.reset_assigned().await.unwrap(), 2);
    assert_eq!(store.reset_assigned().await.unwrap(), 0);

    let unassigned = store
        .fetch_by_status(TaskStatus::Unassigned, OrderBy::Asc, 10)
        .await
        .unwrap();
    assert_eq!(unassigned.iter().map(|t| t.id).collect::<Vec<_>>(), vec![10, 11]);
}

mod in_memory {
    use super::*;

    #[tokio::test]
    async fn test_status_lifecycle() {
        run_status_lifecycle(&InMemoryTaskStore::new()).await;
    }

    #[tokio::test]
    async fn test_proof_content() {
        run_proof_content(&InMemoryTaskStore::new()).await;
    }

    #[tokio::test]
    async fn test_fetch_by_status() {
        run_fetch_by_status(&InMemoryTaskStore::new()).await;
    }

    #[tokio::test]
    async fn test_crash_recovery() {
        run_crash_recovery(&InMemoryTaskStore::new()).await;
    }
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use zkpool_taskdb::SqliteTaskStore;

    #[tokio::test]
    async fn test_status_lifecycle() {
        run_status_lifecycle(&SqliteTaskStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_proof_content() {
        run_proof_content(&SqliteTaskStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_fetch_by_status() {
        run_fetch_by_status(&SqliteTaskStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_crash_recovery() {
        run_crash_recovery(&SqliteTaskStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.sqlite");

        {
            let store = SqliteTaskStore::open(&path).unwrap();
            store.insert_task(Task::new(7, b"x".to_vec())).await.unwrap();
            store.set_status(7, TaskStatus::Assigned).await.unwrap();
        }

        let store = SqliteTaskStore::open(&path).unwrap();
        let task = store.fetch_by_id(7).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
    }
}
