//! Repository for uploads.

use sqlx::PgPool;
use verdant_core::types::DbId;

use crate::models::upload::{CreateUpload, Upload};

/// Column list for `uploads` queries.
const UPLOAD_COLUMNS: &str = "id, filename, status, created_at, updated_at";

/// Read/write access to the `uploads` table.
pub struct UploadRepo;

impl UploadRepo {
    /// Create an upload row, returning the inserted row.
    pub async fn create(pool: &PgPool, input: &CreateUpload) -> Result<Upload, sqlx::Error> {
        let sql = format!(
            "INSERT INTO uploads (filename, status) \
             VALUES ($1, COALESCE($2, 'pending')) \
             RETURNING {UPLOAD_COLUMNS}"
        );
        sqlx::query_as::<_, Upload>(&sql)
            .bind(&input.filename)
            .bind(&input.status)
            .fetch_one(pool)
            .await
    }

    /// Fetch an upload by id. Returns `None` when no row exists.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Upload>, sqlx::Error> {
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = $1");
        sqlx::query_as::<_, Upload>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update an upload's status. Returns `true` when a row was touched.
    pub async fn set_status(pool: &PgPool, id: DbId, status: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE uploads SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
