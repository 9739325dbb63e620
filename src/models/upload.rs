use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;

/// Metadata for a stored binary asset. `collection_name` records which
/// entity family the asset hangs off ("users" for avatars).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: Uuid,
    /// Path of the stored file, relative to the process working directory.
    pub path: String,
    /// Generated on-disk filename.
    pub filename: String,
    /// Filename the client sent.
    pub originalname: String,
    /// Size of the upload in bytes, before any processing.
    pub size: i64,
    pub mimetype: String,
    pub collection_name: String,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to record a freshly stored file.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub path: String,
    pub filename: String,
    pub originalname: String,
    pub size: i64,
    pub mimetype: String,
    pub collection_name: String,
    pub owner: Uuid,
}

const UPLOAD_COLUMNS: &str =
    "id, path, filename, originalname, size, mimetype, collection_name, owner, created_at, updated_at";

impl Upload {
    pub async fn create(pool: &PgPool, new: NewUpload) -> Result<Self, AppError> {
        let sql = format!(
            "INSERT INTO uploads (path, filename, originalname, size, mimetype, collection_name, owner) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            UPLOAD_COLUMNS
        );
        let upload = sqlx::query_as::<_, Upload>(&sql)
            .bind(new.path)
            .bind(new.filename)
            .bind(new.originalname)
            .bind(new.size)
            .bind(new.mimetype)
            .bind(new.collection_name)
            .bind(new.owner)
            .fetch_one(pool)
            .await?;
        Ok(upload)
    }

    pub async fn delete_by_path(pool: &PgPool, path: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM uploads WHERE path = $1")
            .bind(path)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_serializes_camel_case() {
        let upload = Upload {
            id: Uuid::new_v4(),
            path: "store/avatars/avatar-1700000000000.png".to_string(),
            filename: "avatar-1700000000000.png".to_string(),
            originalname: "me.png".to_string(),
            size: 2048,
            mimetype: "image/png".to_string(),
            collection_name: "users".to_string(),
            owner: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&upload).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("collectionName"));
        assert!(object.contains_key("originalname"));
        assert!(!object.contains_key("collection_name"));
    }
}
