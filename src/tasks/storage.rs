use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::model::{parse_date, parse_hhmm, CreateTask, Priority, Task, UpdateTask};
use super::query::TaskQuery;
use crate::error::Error;

// ─── Row type ─────────────────────────────────────────────────────────────────

/// Raw SQLite row. Temporal and structured fields are TEXT and are decoded
/// into the typed [`Task`] by the `TryFrom` impl below.
#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    completed: bool,
    starred: bool,
    due_date: Option<String>,
    due_time: Option<String>,
    tags: String,
    priority: String,
    attachments: i64,
    created_at: String,
    updated_at: String,
}

fn corrupt(id: &str, reason: String) -> Error {
    Error::Corrupt {
        id: id.to_string(),
        reason,
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {s:?}: {e}"))
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(&row.id, format!("bad id: {e}")))?;
        let date = row
            .due_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(|e| corrupt(&row.id, e))?;
        let time = row
            .due_time
            .as_deref()
            .map(parse_hhmm)
            .transpose()
            .map_err(|e| corrupt(&row.id, e))?;
        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .map_err(|e| corrupt(&row.id, format!("bad tags: {e}")))?;
        let priority: Priority = row
            .priority
            .parse()
            .map_err(|e: String| corrupt(&row.id, e))?;
        let attachments = u32::try_from(row.attachments)
            .map_err(|_| corrupt(&row.id, format!("bad attachment count: {}", row.attachments)))?;
        let created_at = parse_timestamp(&row.created_at).map_err(|e| corrupt(&row.id, e))?;
        let updated_at = parse_timestamp(&row.updated_at).map_err(|e| corrupt(&row.id, e))?;

        Ok(Task {
            id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            starred: row.starred,
            date,
            time,
            tags,
            priority,
            attachments,
            created_at,
            updated_at,
        })
    }
}

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn time_to_sql(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format("%H:%M").to_string())
}

fn tags_to_sql(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

// ─── TaskStore ────────────────────────────────────────────────────────────────

/// CRUD and query surface over the `tasks` table. Cheap to clone; all clones
/// share one connection pool.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new task. The id and both timestamps are always generated
    /// here; client-supplied values fill the rest.
    pub async fn create(&self, req: &CreateTask) -> Result<Task, Error> {
        req.validate()?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: req.title.clone(),
            description: req.description.clone(),
            completed: req.completed.unwrap_or(false),
            starred: req.starred.unwrap_or(false),
            date: req.date,
            time: req.time,
            tags: req.tags.clone().unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            attachments: req.attachments.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };
        self.insert(&task).await?;
        self.find_one(task.id).await
    }

    async fn insert(&self, task: &Task) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO tasks
             (id, title, description, completed, starred, due_date, due_time, tags,
              priority, attachments, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.starred)
        .bind(date_to_sql(task.date))
        .bind(time_to_sql(task.time))
        .bind(tags_to_sql(&task.tags))
        .bind(task.priority.as_str())
        .bind(task.attachments as i64)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load every task and run `query` over the snapshot.
    ///
    /// Filtering happens in memory (SQLite has limited dynamic WHERE support
    /// without a query builder); the table is a single user's list, so the
    /// snapshot stays small.
    pub async fn find_all(&self, query: &TaskQuery) -> Result<Vec<Task>, Error> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let tasks = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(query.apply(tasks, Local::now().date_naive()))
    }

    pub async fn find_one(&self, id: Uuid) -> Result<Task, Error> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Task::try_from(row),
            None => Err(Error::NotFound(id)),
        }
    }

    /// Merge `patch` into the stored task. `updatedAt` is refreshed even for
    /// an empty patch, so every successful PATCH leaves a trace.
    pub async fn update(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, Error> {
        patch.validate()?;
        let mut task = self.find_one(id).await?;
        patch.apply_to(&mut task);
        task.updated_at = Utc::now();
        sqlx::query(
            "UPDATE tasks
             SET title = ?, description = ?, completed = ?, starred = ?, due_date = ?,
                 due_time = ?, tags = ?, priority = ?, attachments = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.starred)
        .bind(date_to_sql(task.date))
        .bind(time_to_sql(task.time))
        .bind(tags_to_sql(&task.tags))
        .bind(task.priority.as_str())
        .bind(task.attachments as i64)
        .bind(task.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        self.find_one(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }
}
