use zkpool_lib::{OrderBy, Task, TaskStatus};

mod mem_db;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use mem_db::InMemoryTaskStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTaskStore;

#[derive(thiserror::Error, Debug)]
pub enum TaskStoreError {
    #[error("SQL Error {0}")]
    Sql(String),
    #[error("task {0} not found")]
    NotFound(u64),
    #[error("Anyhow error: {0}")]
    Anyhow(String),
}

pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TaskStoreError {
    fn from(error: rusqlite::Error) -> TaskStoreError {
        TaskStoreError::Sql(error.to_string())
    }
}

/// Durable queue of block-trace proof tasks.
///
/// All operations are idempotent at the status level; the coordinator relies
/// on that when it rolls a task back after a partial failure.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    /// Add a new task row. Replaces an existing row with the same id.
    async fn insert_task(&self, task: Task) -> TaskStoreResult<()>;

    /// Fetch up to `limit` tasks with the given status, ordered by id.
    async fn fetch_by_status(
        &self,
        status: TaskStatus,
        order: OrderBy,
        limit: usize,
    ) -> TaskStoreResult<Vec<Task>>;

    /// Fetch a single task row.
    async fn fetch_by_id(&self, id: u64) -> TaskStoreResult<Option<Task>>;

    /// Update the status column of a task.
    async fn set_status(&self, id: u64, status: TaskStatus) -> TaskStoreResult<()>;

    /// Store the proof content of a successful submission.
    async fn set_proof(
        &self,
        id: u64,
        proof: &[u8],
        final_pair: &[u8],
        proof_time_sec: u64,
    ) -> TaskStoreResult<()>;

    /// Crash recovery: move every `Assigned` task back to `Unassigned`.
    /// Returns the number of rows touched.
    async fn reset_assigned(&self) -> TaskStoreResult<usize>;
}

pub fn ensure(expression: bool, message: &str) -> TaskStoreResult<()> {
    if !expression {
        return Err(TaskStoreError::Anyhow(message.to_string()));
    }
    Ok(())
}
