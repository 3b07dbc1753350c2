// Imports
// ----------------------------------------------------------------
use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::info;

use crate::{ensure, TaskStore, TaskStoreError, TaskStoreResult};
use zkpool_lib::{OrderBy, Task, TaskStatus};

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    db: Arc<Mutex<InMemoryTaskDb>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskDb {
    tasks: HashMap<u64, Task>,
}

impl InMemoryTaskDb {
    fn insert_task(&mut self, task: Task) {
        if self.tasks.insert(task.id, task).is_some() {
            info!("task row replaced");
        }
    }

    fn fetch_by_status(&self, status: TaskStatus, order: OrderBy, limit: usize) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| task.status == status)
            .cloned()
            .collect();
        match order {
            OrderBy::Asc => tasks.sort_by_key(|task| task.id),
            OrderBy::Desc => tasks.sort_by_key(|task| std::cmp::Reverse(task.id)),
        }
        tasks.truncate(limit);
        tasks
    }

    fn fetch_by_id(&self, id: u64) -> Option<Task> {
        self.tasks.get(&id).cloned()
    }

    fn set_status(&mut self, id: u64, status: TaskStatus) -> TaskStoreResult<()> {
        ensure(self.tasks.contains_key(&id), "no task found")?;
        self.tasks.entry(id).and_modify(|task| task.status = status);
        Ok(())
    }

    fn set_proof(
        &mut self,
        id: u64,
        proof: &[u8],
        final_pair: &[u8],
        proof_time_sec: u64,
    ) -> TaskStoreResult<()> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(TaskStoreError::NotFound(id))?;
        task.proof = Some(proof.to_vec());
        task.final_pair = Some(final_pair.to_vec());
        task.proof_time_sec = Some(proof_time_sec);
        Ok(())
    }

    fn reset_assigned(&mut self) -> usize {
        let mut reset = 0;
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Assigned {
                task.status = TaskStatus::Unassigned;
                reset += 1;
            }
        }
        reset
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_task(&self, task: Task) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.insert_task(task);
        Ok(())
    }

    async fn fetch_by_status(
        &self,
        status: TaskStatus,
        order: OrderBy,
        limit: usize,
    ) -> TaskStoreResult<Vec<Task>> {
        let db = self.db.lock().await;
        Ok(db.fetch_by_status(status, order, limit))
    }

    async fn fetch_by_id(&self, id: u64) -> TaskStoreResult<Option<Task>> {
        let db = self.db.lock().await;
        Ok(db.fetch_by_id(id))
    }

    async fn set_status(&self, id: u64, status: TaskStatus) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.set_status(id, status)
    }

    async fn set_proof(
        &self,
        id: u64,
        proof: &[u8],
        final_pair: &[u8],
        proof_time_sec: u64,
    ) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.set_proof(id, proof, final_pair, proof_time_sec)
    }

    async fn reset_assigned(&self) -> TaskStoreResult<usize> {
        let mut db = self.db.lock().await;
        Ok(db.reset_assigned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_status_on_missing_task() {
        let store = InMemoryTaskStore::new();
        assert!(store.set_status(1, TaskStatus::Assigned).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_ordering() {
        let store = InMemoryTaskStore::new();
        for id in [3u64, 1, 2] {
            store.insert_task(Task::new(id, vec![])).await.unwrap();
        }

        let asc = store
            .fetch_by_status(TaskStatus::Unassigned, OrderBy::Asc, 10)
            .await
            .unwrap();
        assert_eq!(asc.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let desc = store
            .fetch_by_status(TaskStatus::Unassigned, OrderBy::Desc, 2)
            .await
            .unwrap();
        assert_eq!(desc.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_reset_assigned() {
        let store = InMemoryTaskStore::new();
        store.insert_task(Task::new(1, vec![])).await.unwrap();
        store.insert_task(Task::new(2, vec![])).await.unwrap();
        store.set_status(1, TaskStatus::Assigned).await.unwrap();

        assert_eq!(store.reset_assigned().await.unwrap(), 1);
        let task = store.fetch_by_id(1).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Unassigned);
    }
}
