//! Live integration tests for tradesync-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/tradesync-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::{DateTime, Duration, Utc};
use tradesync_db::{
    get_task_record, list_intervals, record_start, record_stop, StartOutcome, StopOutcome,
};

/// Postgres stores timestamptz at microsecond precision; compare at that
/// granularity.
fn micros(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|t| t.timestamp_micros())
}

#[sqlx::test(migrations = "../../migrations")]
async fn start_opens_an_interval(pool: sqlx::PgPool) {
    let at = Utc::now();
    let outcome = record_start(&pool, "TT-100", at).await.expect("start");
    assert_eq!(outcome, StartOutcome::Started);

    let record = get_task_record(&pool, "TT-100").await.expect("record");
    assert_eq!(record.record_number, "TT-100");

    let intervals = list_intervals(&pool, "TT-100").await.expect("intervals");
    assert_eq!(intervals.len(), 1);
    assert!(intervals[0].started_at.is_some());
    assert!(intervals[0].stopped_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_start_is_ignored_while_running(pool: sqlx::PgPool) {
    let at = Utc::now();
    record_start(&pool, "TT-100", at).await.expect("start");
    let outcome = record_start(&pool, "TT-100", at + Duration::minutes(5))
        .await
        .expect("second start");
    assert_eq!(outcome, StartOutcome::AlreadyRunning);

    let intervals = list_intervals(&pool, "TT-100").await.expect("intervals");
    assert_eq!(intervals.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stop_closes_the_open_interval(pool: sqlx::PgPool) {
    let started = Utc::now();
    let stopped = started + Duration::hours(2);
    record_start(&pool, "TT-100", started).await.expect("start");
    let outcome = record_stop(&pool, "TT-100", stopped).await.expect("stop");
    assert_eq!(outcome, StopOutcome::Closed);

    let intervals = list_intervals(&pool, "TT-100").await.expect("intervals");
    assert_eq!(intervals.len(), 1);
    assert_eq!(micros(intervals[0].stopped_at), micros(Some(stopped)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn stop_without_start_records_stop_only_interval(pool: sqlx::PgPool) {
    let at = Utc::now();
    let outcome = record_stop(&pool, "TT-200", at).await.expect("stop");
    assert_eq!(outcome, StopOutcome::StopOnly);

    let intervals = list_intervals(&pool, "TT-200").await.expect("intervals");
    assert_eq!(intervals.len(), 1);
    assert!(intervals[0].started_at.is_none());
    assert_eq!(micros(intervals[0].stopped_at), micros(Some(at)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn start_after_stop_opens_a_new_interval(pool: sqlx::PgPool) {
    let t0 = Utc::now();
    record_start(&pool, "TT-100", t0).await.expect("start");
    record_stop(&pool, "TT-100", t0 + Duration::hours(1))
        .await
        .expect("stop");
    let outcome = record_start(&pool, "TT-100", t0 + Duration::hours(3))
        .await
        .expect("restart");
    assert_eq!(outcome, StartOutcome::Started);

    let intervals = list_intervals(&pool, "TT-100").await.expect("intervals");
    assert_eq!(intervals.len(), 2);
    assert!(intervals[1].stopped_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_record_is_not_found(pool: sqlx::PgPool) {
    let err = get_task_record(&pool, "TT-999").await.unwrap_err();
    assert!(matches!(err, tradesync_db::DbError::NotFound));
}
