//! Models for uploads (written by the ingestion collaborator).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use verdant_core::types::{DbId, Timestamp};

/// A row from the `uploads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Upload {
    pub id: DbId,
    pub filename: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an upload.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUpload {
    pub filename: String,
    pub status: Option<String>,
}
