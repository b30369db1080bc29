use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use shared::{Task, TaskUpdate};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Raw row shape for the `tasks` table. `created_at` is stored as RFC 3339
/// text; sqlx decodes it back into `DateTime<Utc>`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    done: bool,
    created_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            done: row.done,
            created_at: row.created_at,
        }
    }
}

/// Data access layer for tasks, backed by a shared SQLite pool.
/// Cloning is cheap (the pool is Arc-backed); each call checks a connection
/// out of the pool for its own duration only.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    /// Open (creating if missing) the database at `url` and make sure the
    /// `tasks` table exists. A failure here is fatal at startup.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tasks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 title TEXT NOT NULL,
                 done BOOLEAN NOT NULL DEFAULT 0,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn insert(&self, title: &str, done: bool) -> Result<Task> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO tasks (title, done, created_at) VALUES (?, ?, ?)")
            .bind(title)
            .bind(done)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow!("task not found after insert"))
    }

    pub async fn list_all(&self) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT id, title, done, created_at FROM tasks ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as("SELECT id, title, done, created_at FROM tasks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Task::from))
    }

    /// Overwrite only the fields present in `patch`; absent fields keep their
    /// stored values and `created_at` is never touched. Runs in one
    /// transaction so a dropped request rolls back instead of leaving a
    /// half-applied patch.
    pub async fn update_fields(&self, id: i64, patch: &TaskUpdate) -> Result<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<TaskRow> =
            sqlx::query_as("SELECT id, title, done, created_at FROM tasks WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(mut row) = row else {
            return Ok(None);
        };

        if let Some(ref title) = patch.title {
            row.title = title.clone();
        }
        if let Some(done) = patch.done {
            row.done = done;
        }

        sqlx::query("UPDATE tasks SET title = ?, done = ? WHERE id = ?")
            .bind(&row.title)
            .bind(row.done)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(row.into()))
    }

    /// Returns false when no task with that id exists.
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tasks.db").display());
        let store = TaskStore::connect(&url).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn insert_assigns_ascending_ids_and_defaults() {
        let (_dir, store) = temp_store().await;
        let before = Utc::now();

        let first = store.insert("buy milk", false).await.unwrap();
        let second = store.insert("walk dog", true).await.unwrap();

        assert_eq!(first.title, "buy milk");
        assert!(!first.done);
        assert!(first.created_at >= before);
        assert!(second.id > first.id);

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn update_fields_touches_only_patched_fields() {
        let (_dir, store) = temp_store().await;
        let task = store.insert("buy milk", false).await.unwrap();

        let patch = TaskUpdate {
            title: None,
            done: Some(true),
        };
        let updated = store.update_fields(task.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.title, task.title);
        assert_eq!(updated.created_at, task.created_at);
        assert!(updated.done);

        // and the change is durable
        let fetched = store.get_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn missing_rows_are_reported_not_errored() {
        let (_dir, store) = temp_store().await;

        assert!(store.get_by_id(999).await.unwrap().is_none());
        assert!(store
            .update_fields(999, &TaskUpdate::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_by_id(999).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (_dir, store) = temp_store().await;
        let task = store.insert("buy milk", false).await.unwrap();

        assert!(store.delete_by_id(task.id).await.unwrap());
        assert!(store.get_by_id(task.id).await.unwrap().is_none());
        // second delete is a clean not-found, not an error
        assert!(!store.delete_by_id(task.id).await.unwrap());
    }
}
