use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;

/// Fields a profile update may touch. Any other key fails the whole request
/// before anything is written.
pub const USER_UPDATE_FIELDS: &[&str] = &["name", "email", "password", "age"];

/// An account row. The bcrypt digest never leaves the server: it is skipped
/// on serialization, and deserialization (used by API clients reading our
/// responses) tolerates its absence.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub age: i32,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("Name is required".into());
        return Err(error);
    }
    Ok(())
}

/// The literal word "password" is banned, in any casing and with
/// surrounding whitespace.
fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().eq_ignore_ascii_case("password") {
        let mut error = ValidationError::new("reserved");
        error.message = Some("Password cannot be \"password\"".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(
        length(min = 7, message = "Password must be longer than 6 characters"),
        custom = "validate_password"
    )]
    pub password: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: i32,
}

/// Partial profile update. Every field is optional; present fields go
/// through the same rules as on registration.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(custom = "validate_name")]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(
        length(min = 7, message = "Password must be longer than 6 characters"),
        custom = "validate_password"
    )]
    pub password: Option<String>,
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: Option<i32>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, age, avatar, created_at, updated_at";

impl User {
    /// Inserts a new account. The plaintext password is hashed here, before
    /// the row is written, so no call path can persist it raw. Emails are
    /// stored trimmed and lowercased; a duplicate surfaces as a validation
    /// failure via the unique constraint.
    pub async fn create(pool: &PgPool, request: CreateUserRequest) -> Result<Self, AppError> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;

        let sql = format!(
            "INSERT INTO users (name, email, password_hash, age) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(request.name.trim())
            .bind(request.email.trim().to_lowercase())
            .bind(password_hash)
            .bind(request.age)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Resolves a login attempt. The same opaque error covers an unknown
    /// email and a wrong password, so the response cannot reveal which of
    /// the two failed.
    pub async fn find_by_credentials(
        pool: &PgPool,
        email: &str,
        password: &str,
    ) -> Result<Self, AppError> {
        let user = Self::find_by_email(pool, &email.trim().to_lowercase())
            .await?
            .ok_or_else(|| AppError::BadRequest("Unable to login".into()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::BadRequest("Unable to login".into()));
        }

        Ok(user)
    }

    pub async fn all(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?;
        Ok(users)
    }

    /// Applies a profile update. The router must have allow-listed the field
    /// keys already; a password in the update is re-hashed here before it
    /// can reach the row.
    pub async fn apply_update(
        pool: &PgPool,
        id: Uuid,
        update: UpdateUserRequest,
    ) -> Result<Self, AppError> {
        update.validate()?;

        let password_hash = match &update.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        // Build the UPDATE dynamically, binding only the fields present.
        let mut sql = String::from("UPDATE users SET updated_at = NOW()");
        let mut param_count = 1;

        if update.name.is_some() {
            param_count += 1;
            sql.push_str(&format!(", name = ${}", param_count));
        }
        if update.email.is_some() {
            param_count += 1;
            sql.push_str(&format!(", email = ${}", param_count));
        }
        if password_hash.is_some() {
            param_count += 1;
            sql.push_str(&format!(", password_hash = ${}", param_count));
        }
        if update.age.is_some() {
            param_count += 1;
            sql.push_str(&format!(", age = ${}", param_count));
        }

        sql.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut query = sqlx::query_as::<_, User>(&sql).bind(id);
        if let Some(name) = &update.name {
            query = query.bind(name.trim().to_string());
        }
        if let Some(email) = &update.email {
            query = query.bind(email.trim().to_lowercase());
        }
        if let Some(hash) = password_hash {
            query = query.bind(hash);
        }
        if let Some(age) = update.age {
            query = query.bind(age);
        }

        let user = query.fetch_one(pool).await?;
        Ok(user)
    }

    /// Removes the account. Session tokens, tasks and upload records go
    /// with it through the foreign-key cascades.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Points the account at a new stored avatar path, or clears it.
    pub async fn set_avatar(
        pool: &PgPool,
        id: Uuid,
        avatar: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(avatar)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateUserRequest {
        CreateUserRequest {
            name: "Jess".to_string(),
            email: "jess@example.com".to_string(),
            password: "horsebattery".to_string(),
            age: 0,
        }
    }

    #[test]
    fn test_create_request_validation() {
        assert!(valid_request().validate().is_ok());

        // Blank name
        let mut request = valid_request();
        request.name = "   ".to_string();
        assert!(request.validate().is_err());

        // Invalid email
        let mut request = valid_request();
        request.email = "not-an-email".to_string();
        assert!(request.validate().is_err());

        // Password too short (boundary: 6 fails, 7 passes)
        let mut request = valid_request();
        request.password = "sixsix".to_string();
        assert!(request.validate().is_err());
        request.password = "sevens7".to_string();
        assert!(request.validate().is_ok());

        // Reserved password, any casing
        let mut request = valid_request();
        request.password = "password".to_string();
        assert!(request.validate().is_err());
        request.password = "  PassWord  ".to_string();
        assert!(request.validate().is_err());

        // Negative age
        let mut request = valid_request();
        request.age = -3;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_request_age_defaults_to_zero() {
        let request: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "Jess",
            "email": "jess@example.com",
            "password": "horsebattery"
        }))
        .unwrap();
        assert_eq!(request.age, 0);
    }

    #[test]
    fn test_update_request_validates_present_fields_only() {
        let update = UpdateUserRequest {
            age: Some(30),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = UpdateUserRequest {
            password: Some("Password".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdateUserRequest {
            email: Some("broken".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_serialized_user_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Jess".to_string(),
            email: "jess@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            age: 27,
            avatar: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&user).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("passwordHash"));
        assert!(!object.contains_key("password_hash"));
        assert!(object.contains_key("createdAt"));
        assert!(object.contains_key("updatedAt"));
    }
}
