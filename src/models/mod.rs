pub mod task;
pub mod upload;
pub mod user;

pub use task::{CreateTaskRequest, Task, TaskListQuery, UpdateTaskRequest, TASK_UPDATE_FIELDS};
pub use upload::{NewUpload, Upload};
pub use user::{CreateUserRequest, UpdateUserRequest, User, USER_UPDATE_FIELDS};

use crate::error::AppError;

/// Rejects a partial-update body unless it is a JSON object whose every key
/// sits in the allow-list. Runs before deserialization, so one unknown field
/// fails the whole request with no partial effects.
pub fn ensure_allowed_fields(
    body: &serde_json::Value,
    allowed: &[&str],
) -> Result<(), AppError> {
    let object = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Invalid update".into()))?;

    if object.keys().any(|key| !allowed.contains(&key.as_str())) {
        return Err(AppError::BadRequest("Invalid update".into()));
    }

    Ok(())
}
