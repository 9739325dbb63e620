use crate::{
    auth::AuthedUser,
    error::AppError,
    models::{
        ensure_allowed_fields, CreateTaskRequest, Task, TaskListQuery, UpdateTaskRequest,
        TASK_UPDATE_FIELDS,
    },
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Identifiers arrive as raw path segments so that a malformed one maps to
/// 400, not to actix's routing behavior.
fn parse_task_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::BadRequest("Invalid task id".into()))
}

/// Creates a task owned by the authenticated caller.
///
/// Only `title` and `completed` are read from the body; ownership comes
/// from the session, never from input.
///
/// ## Responses:
/// - `201 Created`: Returns the new task as JSON.
/// - `400 Bad Request`: If the title is missing or blank.
/// - `401 Unauthorized`: If the request lacks a valid session token.
#[post("/tasks")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    body: web::Json<CreateTaskRequest>,
) -> Result<impl Responder, AppError> {
    let task = Task::create(pool.get_ref(), authed.user.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(task))
}

/// Lists the caller's tasks as a plain JSON array.
///
/// ## Query Parameters:
/// - `completed` (optional): keep only tasks in this completion state.
/// - `limit` / `skip` (optional): pagination window.
/// - `sortBy` (optional): `field:direction`, e.g. `createdAt:desc`.
#[get("/tasks")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = Task::list_for_owner(pool.get_ref(), authed.user.id, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Lists the caller's tasks wrapped in an envelope with the total count of
/// matching rows: `{"result": [...], "totalCount": n}`. Accepts the same
/// query parameters as the plain listing. A page past the end of the
/// result set reports a total of zero.
#[get("/tasks-alt")]
pub async fn list_tasks_alt(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, AppError> {
    let (result, total_count) =
        Task::list_page_with_total(pool.get_ref(), authed.user.id, &query).await?;
    Ok(HttpResponse::Ok().json(json!({
        "result": result,
        "totalCount": total_count
    })))
}

/// Fetches one of the caller's tasks.
///
/// ## Responses:
/// - `200 OK`: Returns the task as JSON.
/// - `400 Bad Request`: If the id is not a valid UUID.
/// - `401 Unauthorized`: If the request lacks a valid session token.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[get("/tasks/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    task_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let id = parse_task_id(&task_id)?;
    let task = Task::find_owned(pool.get_ref(), authed.user.id, id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Partially updates one of the caller's tasks.
///
/// The body may only contain `title` and `completed`; any other key fails
/// the whole request with `{"error": "Invalid update"}` before anything is
/// written. Id and field checks run before the ownership lookup, so a bad
/// request is 400 even when the task would also have been 404.
#[patch("/tasks/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    task_id: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<impl Responder, AppError> {
    let id = parse_task_id(&task_id)?;
    ensure_allowed_fields(&body, TASK_UPDATE_FIELDS)?;

    let update: UpdateTaskRequest = serde_json::from_value(body.into_inner())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let task = Task::apply_update(pool.get_ref(), authed.user.id, id, update).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes one of the caller's tasks and returns the removed record.
///
/// ## Responses:
/// - `200 OK`: Returns the deleted task as JSON.
/// - `400 Bad Request`: If the id is not a valid UUID.
/// - `401 Unauthorized`: If the request lacks a valid session token.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[delete("/tasks/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    task_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let id = parse_task_id(&task_id)?;
    let task = Task::delete_owned(pool.get_ref(), authed.user.id, id).await?;
    Ok(HttpResponse::Ok().json(task))
}
