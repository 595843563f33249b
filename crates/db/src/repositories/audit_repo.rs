//! Repository for the append-only audit log.

use sqlx::PgPool;
use verdant_core::types::DbId;

use crate::models::audit::{AuditEntry, CreateAuditEntry};

/// Column list for `audit_log` queries.
const AUDIT_COLUMNS: &str = "id, entity_type, entity_id, action, actor, changes, created_at";

/// Append/read access to the `audit_log` table. Entries are never
/// updated or deleted.
pub struct AuditRepo;

impl AuditRepo {
    /// Append one audit entry, returning the inserted row.
    pub async fn append(
        pool: &PgPool,
        input: &CreateAuditEntry,
    ) -> Result<AuditEntry, sqlx::Error> {
        let sql = format!(
            "INSERT INTO audit_log (entity_type, entity_id, action, actor, changes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {AUDIT_COLUMNS}"
        );
        sqlx::query_as::<_, AuditEntry>(&sql)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&input.action)
            .bind(&input.actor)
            .bind(&input.changes)
            .fetch_one(pool)
            .await
    }

    /// All entries for one entity, newest first.
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_id: DbId,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, AuditEntry>(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }
}
