//! Database operations for `task_records` and `task_intervals`.
//!
//! The Smartsheet webhook feeds these: a Start event opens an interval for a
//! task record, a Stop event closes it. Events are idempotent at this layer
//! so webhook redeliveries do not double-log time.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `task_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRecordRow {
    pub id: i64,
    pub record_number: String,
    pub created_at: DateTime<Utc>,
}

/// A row from the `task_intervals` table.
///
/// `started_at` is null for stop-only intervals, recorded when a Stop event
/// arrived with no open interval to close.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskIntervalRow {
    pub id: i64,
    pub task_record_id: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What [`record_start`] did with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new interval was opened.
    Started,
    /// An open interval already existed; the event was ignored.
    AlreadyRunning,
}

/// What [`record_stop`] did with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The open interval was closed.
    Closed,
    /// No open interval existed; a stop-only interval was recorded.
    StopOnly,
}

/// Fetches a task record by its sheet `Record #` value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when no record exists for the number.
pub async fn get_task_record(pool: &PgPool, record_number: &str) -> Result<TaskRecordRow, DbError> {
    sqlx::query_as::<_, TaskRecordRow>(
        "SELECT id, record_number, created_at FROM task_records WHERE record_number = $1",
    )
    .bind(record_number)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

async fn upsert_task_record(pool: &PgPool, record_number: &str) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO task_records (record_number) VALUES ($1) \
         ON CONFLICT (record_number) DO UPDATE SET record_number = EXCLUDED.record_number \
         RETURNING id",
    )
    .bind(record_number)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Records a Start event for a task: opens an interval at `at` unless one is
/// already open for the record.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_start(
    pool: &PgPool,
    record_number: &str,
    at: DateTime<Utc>,
) -> Result<StartOutcome, DbError> {
    let record_id = upsert_task_record(pool, record_number).await?;

    // The partial unique index on open intervals makes the insert lose the
    // race instead of creating a second one.
    let result = sqlx::query(
        "INSERT INTO task_intervals (task_record_id, started_at) \
         SELECT $1, $2 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM task_intervals \
             WHERE task_record_id = $1 AND started_at IS NOT NULL AND stopped_at IS NULL \
         ) \
         ON CONFLICT DO NOTHING",
    )
    .bind(record_id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(StartOutcome::AlreadyRunning)
    } else {
        Ok(StartOutcome::Started)
    }
}

/// Records a Stop event for a task: closes the open interval at `at`, or
/// writes a stop-only interval when nothing was running.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update or insert fails.
pub async fn record_stop(
    pool: &PgPool,
    record_number: &str,
    at: DateTime<Utc>,
) -> Result<StopOutcome, DbError> {
    let record_id = upsert_task_record(pool, record_number).await?;

    let result = sqlx::query(
        "UPDATE task_intervals SET stopped_at = $2 \
         WHERE task_record_id = $1 AND started_at IS NOT NULL AND stopped_at IS NULL",
    )
    .bind(record_id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(StopOutcome::Closed);
    }

    sqlx::query("INSERT INTO task_intervals (task_record_id, stopped_at) VALUES ($1, $2)")
        .bind(record_id)
        .bind(at)
        .execute(pool)
        .await?;

    Ok(StopOutcome::StopOnly)
}

/// Lists a record's intervals, oldest first.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the record does not exist.
pub async fn list_intervals(
    pool: &PgPool,
    record_number: &str,
) -> Result<Vec<TaskIntervalRow>, DbError> {
    let record = get_task_record(pool, record_number).await?;
    let rows = sqlx::query_as::<_, TaskIntervalRow>(
        "SELECT id, task_record_id, started_at, stopped_at, created_at \
         FROM task_intervals WHERE task_record_id = $1 ORDER BY created_at, id",
    )
    .bind(record.id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
