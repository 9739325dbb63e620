use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Fields a task update may touch. Any other key fails the whole request
/// before anything is written.
pub const TASK_UPDATE_FIELDS: &[&str] = &["title", "completed"];

/// A task entity as stored in the database and returned by the API.
/// Every task belongs to exactly one owner; lookups are always scoped to it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    /// The user this task belongs to. Set from the authenticated caller on
    /// creation, never from request input.
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("Title is required".into());
        return Err(error);
    }
    Ok(())
}

/// Input for creating a task. Unknown fields in the body are ignored, so an
/// `owner` smuggled into the payload never reaches the row.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(custom = "validate_title")]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Partial task update. Field keys are allow-listed by the router first.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(custom = "validate_title")]
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Query parameters accepted when listing tasks.
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    /// Keep only tasks in this completion state.
    pub completed: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    /// `field:direction`, e.g. `createdAt:desc`.
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

/// Sortable columns, keyed the way the JSON API spells them.
fn sort_column(field: &str) -> Option<&'static str> {
    match field {
        "createdAt" => Some("created_at"),
        "updatedAt" => Some("updated_at"),
        "title" => Some("title"),
        "completed" => Some("completed"),
        _ => None,
    }
}

/// Parses a `sortBy` value into an ORDER BY fragment. The direction is
/// descending only for the literal `desc`; anything else, including a
/// missing direction, sorts ascending. Unknown fields are ignored rather
/// than rejected.
pub fn order_by_clause(sort_by: Option<&str>) -> Option<String> {
    let raw = sort_by?;
    let (field, direction) = raw.split_once(':').unwrap_or((raw, ""));
    let column = sort_column(field)?;
    let direction = if direction == "desc" { "DESC" } else { "ASC" };
    Some(format!("{} {}", column, direction))
}

const TASK_COLUMNS: &str = "id, title, completed, owner, created_at, updated_at";

/// Row shape for the paged listing: each row carries the total count of
/// matching rows via a window function, so page and total come back in a
/// single round trip.
#[derive(Debug, FromRow)]
struct TaskPageRow {
    id: Uuid,
    title: String,
    completed: bool,
    owner: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    total_count: i64,
}

impl From<TaskPageRow> for Task {
    fn from(row: TaskPageRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            completed: row.completed,
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Appends the shared filter, sort and pagination clauses for a listing
/// query. Callers bind the extra parameters in the same order the clauses
/// are added: completed, limit, skip.
fn push_list_clauses(sql: &mut String, query: &TaskListQuery, mut param_count: u32) {
    if query.completed.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND completed = ${}", param_count));
    }
    if let Some(order) = order_by_clause(query.sort_by.as_deref()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }
    if query.limit.is_some() {
        param_count += 1;
        sql.push_str(&format!(" LIMIT ${}", param_count));
    }
    if query.skip.is_some() {
        param_count += 1;
        sql.push_str(&format!(" OFFSET ${}", param_count));
    }
}

impl Task {
    pub async fn create(
        pool: &PgPool,
        owner: Uuid,
        request: CreateTaskRequest,
    ) -> Result<Self, AppError> {
        request.validate()?;

        let sql = format!(
            "INSERT INTO tasks (title, completed, owner) VALUES ($1, $2, $3) RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(request.title.trim())
            .bind(request.completed)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        Ok(task)
    }

    /// Lists one owner's tasks with the optional completion filter, sort
    /// and pagination applied.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner: Uuid,
        query: &TaskListQuery,
    ) -> Result<Vec<Self>, AppError> {
        let mut sql = format!("SELECT {} FROM tasks WHERE owner = $1", TASK_COLUMNS);
        push_list_clauses(&mut sql, query, 1);

        let mut q = sqlx::query_as::<_, Task>(&sql).bind(owner);
        if let Some(completed) = query.completed {
            q = q.bind(completed);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }
        if let Some(skip) = query.skip {
            q = q.bind(skip);
        }

        let tasks = q.fetch_all(pool).await?;
        Ok(tasks)
    }

    /// Same filters as `list_for_owner`, but returns the page together with
    /// the total number of matching rows. The total is read off the page
    /// rows themselves; a page past the end of the result set therefore
    /// reports a total of zero.
    pub async fn list_page_with_total(
        pool: &PgPool,
        owner: Uuid,
        query: &TaskListQuery,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let mut sql = format!(
            "SELECT {}, COUNT(*) OVER() AS total_count FROM tasks WHERE owner = $1",
            TASK_COLUMNS
        );
        push_list_clauses(&mut sql, query, 1);

        let mut q = sqlx::query_as::<_, TaskPageRow>(&sql).bind(owner);
        if let Some(completed) = query.completed {
            q = q.bind(completed);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }
        if let Some(skip) = query.skip {
            q = q.bind(skip);
        }

        let rows = q.fetch_all(pool).await?;
        let total = rows.first().map(|row| row.total_count).unwrap_or(0);
        let tasks = rows.into_iter().map(Task::from).collect();
        Ok((tasks, total))
    }

    /// Fetches a task only if it belongs to `owner`. A task owned by
    /// someone else answers exactly like a missing one.
    pub async fn find_owned(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<Self, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND owner = $2",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Applies an update to an owned task. Ownership is part of the WHERE
    /// clause, so a foreign task is indistinguishable from a missing one.
    pub async fn apply_update(
        pool: &PgPool,
        owner: Uuid,
        id: Uuid,
        update: UpdateTaskRequest,
    ) -> Result<Self, AppError> {
        update.validate()?;

        let mut sql = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut param_count = 2;

        if update.title.is_some() {
            param_count += 1;
            sql.push_str(&format!(", title = ${}", param_count));
        }
        if update.completed.is_some() {
            param_count += 1;
            sql.push_str(&format!(", completed = ${}", param_count));
        }

        sql.push_str(&format!(
            " WHERE id = $1 AND owner = $2 RETURNING {}",
            TASK_COLUMNS
        ));

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(id).bind(owner);
        if let Some(title) = &update.title {
            query = query.bind(title.trim().to_string());
        }
        if let Some(completed) = update.completed {
            query = query.bind(completed);
        }

        query
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Deletes an owned task and returns the removed row.
    pub async fn delete_owned(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<Self, AppError> {
        let sql = format!(
            "DELETE FROM tasks WHERE id = $1 AND owner = $2 RETURNING {}",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)
    }
}
