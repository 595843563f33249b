//! Repository for validation outcomes and their review state.

use sqlx::PgPool;
use verdant_core::types::DbId;

use crate::models::outcome::{CreateOutcome, ValidationOutcome};

/// Column list for `validation_outcomes` queries.
const OUTCOME_COLUMNS: &str = "id, data_id, rule_name, severity, message, citation, \
     actual_value, expected_min, expected_max, reviewed, reviewer_notes, created_at, updated_at";

/// Column list with the `vo.` alias for joined queries.
const OUTCOME_COLUMNS_ALIASED: &str = "vo.id, vo.data_id, vo.rule_name, vo.severity, \
     vo.message, vo.citation, vo.actual_value, vo.expected_min, vo.expected_max, vo.reviewed, \
     vo.reviewer_notes, vo.created_at, vo.updated_at";

/// Read/write access to the `validation_outcomes` table.
pub struct OutcomeRepo;

impl OutcomeRepo {
    /// Replace all outcomes of an upload in one transaction.
    ///
    /// A validation run is purge-and-replace: prior outcomes (and their
    /// review state) are dropped together with the insert of the new set,
    /// so a half-written run can never be observed.
    pub async fn replace_for_upload(
        pool: &PgPool,
        upload_id: DbId,
        outcomes: &[CreateOutcome],
    ) -> Result<u64, sqlx::Error> {
        tracing::debug!(upload_id, outcomes = outcomes.len(), "Replacing upload outcomes");

        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM validation_outcomes \
             WHERE data_id IN (SELECT id FROM normalized_measurements WHERE upload_id = $1)",
        )
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;

        for outcome in outcomes {
            Self::insert(&mut tx, outcome).await?;
        }

        tx.commit().await?;
        Ok(outcomes.len() as u64)
    }

    /// Replace one record's outcomes in one transaction (revalidation).
    pub async fn replace_for_record(
        pool: &PgPool,
        data_id: DbId,
        outcomes: &[CreateOutcome],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM validation_outcomes WHERE data_id = $1")
            .bind(data_id)
            .execute(&mut *tx)
            .await?;

        for outcome in outcomes {
            Self::insert(&mut tx, outcome).await?;
        }

        tx.commit().await?;
        Ok(outcomes.len() as u64)
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        outcome: &CreateOutcome,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO validation_outcomes \
                 (data_id, rule_name, severity, message, citation, actual_value, \
                  expected_min, expected_max) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(outcome.data_id)
        .bind(&outcome.rule_name)
        .bind(&outcome.severity)
        .bind(&outcome.message)
        .bind(&outcome.citation)
        .bind(outcome.actual_value)
        .bind(outcome.expected_min)
        .bind(outcome.expected_max)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Fetch one outcome by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ValidationOutcome>, sqlx::Error> {
        let sql = format!("SELECT {OUTCOME_COLUMNS} FROM validation_outcomes WHERE id = $1");
        sqlx::query_as::<_, ValidationOutcome>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All outcomes of an upload, ordered by rule name then id.
    pub async fn list_for_upload(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<Vec<ValidationOutcome>, sqlx::Error> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS_ALIASED} \
             FROM validation_outcomes vo \
             JOIN normalized_measurements nm ON nm.id = vo.data_id \
             WHERE nm.upload_id = $1 \
             ORDER BY vo.rule_name, vo.id"
        );
        sqlx::query_as::<_, ValidationOutcome>(&sql)
            .bind(upload_id)
            .fetch_all(pool)
            .await
    }

    /// Outcomes of one severity, optionally filtered by review state.
    pub async fn list_by_severity(
        pool: &PgPool,
        upload_id: DbId,
        severity: &str,
        reviewed: Option<bool>,
    ) -> Result<Vec<ValidationOutcome>, sqlx::Error> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS_ALIASED} \
             FROM validation_outcomes vo \
             JOIN normalized_measurements nm ON nm.id = vo.data_id \
             WHERE nm.upload_id = $1 \
               AND vo.severity = $2 \
               AND ($3::boolean IS NULL OR vo.reviewed = $3) \
             ORDER BY vo.rule_name, vo.id"
        );
        sqlx::query_as::<_, ValidationOutcome>(&sql)
            .bind(upload_id)
            .bind(severity)
            .bind(reviewed)
            .fetch_all(pool)
            .await
    }

    /// All reviewed outcomes of an upload (reviewed errors and suppressed
    /// warnings alike), ordered by rule name then id.
    pub async fn list_reviewed(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<Vec<ValidationOutcome>, sqlx::Error> {
        let sql = format!(
            "SELECT {OUTCOME_COLUMNS_ALIASED} \
             FROM validation_outcomes vo \
             JOIN normalized_measurements nm ON nm.id = vo.data_id \
             WHERE nm.upload_id = $1 AND vo.reviewed = true \
             ORDER BY vo.rule_name, vo.id"
        );
        sqlx::query_as::<_, ValidationOutcome>(&sql)
            .bind(upload_id)
            .fetch_all(pool)
            .await
    }

    /// Distinct measurements of an upload still carrying unreviewed errors.
    pub async fn count_records_with_unreviewed_errors(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT vo.data_id) \
             FROM validation_outcomes vo \
             JOIN normalized_measurements nm ON nm.id = vo.data_id \
             WHERE nm.upload_id = $1 \
               AND vo.severity = 'error' \
               AND vo.reviewed = false",
        )
        .bind(upload_id)
        .fetch_one(pool)
        .await?;
        Ok(count.0 as u64)
    }

    /// Mark an outcome as reviewed. Last write wins on concurrent
    /// reviewer updates; the caller appends the audit entry.
    ///
    /// Returns `None` when no row with the given id exists.
    pub async fn mark_reviewed(
        pool: &PgPool,
        id: DbId,
        notes: &str,
    ) -> Result<Option<ValidationOutcome>, sqlx::Error> {
        let sql = format!(
            "UPDATE validation_outcomes \
             SET reviewed = true, reviewer_notes = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {OUTCOME_COLUMNS}"
        );
        sqlx::query_as::<_, ValidationOutcome>(&sql)
            .bind(id)
            .bind(notes)
            .fetch_optional(pool)
            .await
    }
}
