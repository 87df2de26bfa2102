use anyhow::{Context, Result};
use bol_audit::{BatchErrorKey, BatchErrorRecord};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Insert a batch-error record, or bump `occurrences` and refresh the
/// message when the composite key is already there. Returns the occurrence
/// count after the write.
pub async fn upsert_batch_error(pool: &PgPool, rec: &BatchErrorRecord) -> Result<i32> {
    let (occurrences,): (i32,) = sqlx::query_as(
        r#"
        insert into batch_errors (
          process_date, source_code, primary_id, secondary_id, record_id,
          error_kind, message, occurrences, first_seen_at, last_seen_at
        ) values (
          $1, $2, $3, $4, $5, $6, $7, 1, $8, $8
        )
        on conflict (process_date, source_code, primary_id, secondary_id)
        do update set
          error_kind   = excluded.error_kind,
          message      = excluded.message,
          occurrences  = batch_errors.occurrences + 1,
          last_seen_at = excluded.last_seen_at
        returning occurrences
        "#,
    )
    .bind(rec.key.process_date)
    .bind(&rec.key.source_code)
    .bind(&rec.key.primary_id)
    .bind(&rec.key.secondary_id)
    .bind(rec.record_id)
    .bind(&rec.error_kind)
    .bind(&rec.message)
    .bind(rec.recorded_at)
    .fetch_one(pool)
    .await
    .context("upsert_batch_error failed")?;

    Ok(occurrences)
}

#[derive(Debug, Clone)]
pub struct BatchErrorRow {
    pub key: BatchErrorKey,
    pub record_id: Uuid,
    pub error_kind: String,
    pub message: String,
    pub occurrences: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

pub async fn fetch_batch_errors(pool: &PgPool, process_date: NaiveDate) -> Result<Vec<BatchErrorRow>> {
    let rows = sqlx::query(
        r#"
        select process_date, source_code, primary_id, secondary_id, record_id,
               error_kind, message, occurrences, first_seen_at, last_seen_at
        from batch_errors
        where process_date = $1
        order by source_code, primary_id, secondary_id
        "#,
    )
    .bind(process_date)
    .fetch_all(pool)
    .await
    .context("fetch_batch_errors failed")?;

    rows.iter()
        .map(|r| -> Result<BatchErrorRow> {
            Ok(BatchErrorRow {
                key: BatchErrorKey {
                    process_date: r.try_get("process_date")?,
                    source_code: r.try_get("source_code")?,
                    primary_id: r.try_get("primary_id")?,
                    secondary_id: r.try_get("secondary_id")?,
                },
                record_id: r.try_get("record_id")?,
                error_kind: r.try_get("error_kind")?,
                message: r.try_get("message")?,
                occurrences: r.try_get("occurrences")?,
                first_seen_at: r.try_get("first_seen_at")?,
                last_seen_at: r.try_get("last_seen_at")?,
            })
        })
        .collect()
}
