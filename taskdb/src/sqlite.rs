// Imports
// ----------------------------------------------------------------
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::info;

use crate::{TaskStore, TaskStoreError, TaskStoreResult};
use zkpool_lib::{OrderBy, Task, TaskStatus};

pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    pub fn open(path: &Path) -> TaskStoreResult<Self> {
        info!("SqliteTaskStore.open: {}", path.display());
        let conn = Connection::open(path)?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private db for tests.
    pub fn open_in_memory() -> TaskStoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn create_tables(conn: &Connection) -> TaskStoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks(
                id INTEGER PRIMARY KEY,
                payload BLOB NOT NULL,
                status INTEGER NOT NULL,
                proof BLOB,
                final_pair BLOB,
                proof_time_sec INTEGER,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            "#,
        )?;
        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        Ok(Task {
            id: row.get::<_, i64>(0)? as u64,
            payload: row.get(1)?,
            status: TaskStatus::from(row.get::<_, i32>(2)?),
            proof: row.get(3)?,
            final_pair: row.get(4)?,
            proof_time_sec: row.get::<_, Option<i64>>(5)?.map(|secs| secs as u64),
        })
    }
}

#[async_trait::async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert_task(&self, task: Task) -> TaskStoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO tasks(id, payload, status, proof, final_pair, proof_time_sec)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                task.id as i64,
                task.payload,
                i32::from(task.status),
                task.proof,
                task.final_pair,
                task.proof_time_sec.map(|secs| secs as i64),
            ],
        )?;
        Ok(())
    }

    async fn fetch_by_status(
        &self,
        status: TaskStatus,
        order: OrderBy,
        limit: usize,
    ) -> TaskStoreResult<Vec<Task>> {
        let conn = self.conn.lock().await;
        let sql = match order {
            OrderBy::Asc => {
                "SELECT id, payload, status, proof, final_pair, proof_time_sec
                 FROM tasks WHERE status = ?1 ORDER BY id ASC LIMIT ?2"
            }
            OrderBy::Desc => {
                "SELECT id, payload, status, proof, final_pair, proof_time_sec
                 FROM tasks WHERE status = ?1 ORDER BY id DESC LIMIT ?2"
            }
        };
        let mut statement = conn.prepare(sql)?;
        let tasks = statement
            .query_map(
                params![i32::from(status), limit as i64],
                Self::row_to_task,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    async fn fetch_by_id(&self, id: u64) -> TaskStoreResult<Option<Task>> {
        let conn = self.conn.lock().await;
        let task = conn
            .query_row(
                "SELECT id, payload, status, proof, final_pair, proof_time_sec
                 FROM tasks WHERE id = ?1",
                params![id as i64],
                Self::row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    async fn set_status(&self, id: u64, status: TaskStatus) -> TaskStoreResult<()> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id as i64, i32::from(status)],
        )?;
        if updated == 0 {
            return Err(TaskStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn set_proof(
        &self,
        id: u64,
        proof: &[u8],
        final_pair: &[u8],
        proof_time_sec: u64,
    ) -> TaskStoreResult<()> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE tasks
             SET proof = ?2, final_pair = ?3, proof_time_sec = ?4, updated_at = datetime('now')
             WHERE id = ?1",
            params![id as i64, proof, final_pair, proof_time_sec as i64],
        )?;
        if updated == 0 {
            return Err(TaskStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn reset_assigned(&self) -> TaskStoreResult<usize> {
        let conn = self.conn.lock().await;
        let reset = conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = datetime('now') WHERE status = ?1",
            params![
                i32::from(TaskStatus::Assigned),
                i32::from(TaskStatus::Unassigned)
            ],
        )?;
        Ok(reset)
    }
}
