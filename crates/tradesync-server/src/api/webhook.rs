//! Smartsheet webhook callback: `POST /api/v1/webhooks/smartsheet`.
//!
//! Two request shapes arrive here. Verification requests carry a
//! `Smartsheet-Hook-Challenge` header and expect the challenge echoed back;
//! everything else is an event callback for the task tracker sheet, where
//! status cell changes drive the time log.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tradesync_db::{record_start, record_stop, DbError};
use tradesync_smartsheet::ColumnIndex;

use super::{ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const CHALLENGE_HEADER: &str = "Smartsheet-Hook-Challenge";
const CHALLENGE_RESPONSE_HEADER: &str = "Smartsheet-Hook-Response";
const RECORD_COLUMN: &str = "Record #";

#[derive(Debug, Deserialize)]
struct WebhookCallback {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(default)]
    row_id: Option<i64>,
    #[serde(default)]
    column_id: Option<i64>,
}

/// What one callback did with its events.
#[derive(Debug, Default, Serialize)]
struct WebhookOutcome {
    processed: usize,
    started: usize,
    stopped: usize,
    ignored: usize,
    errored: usize,
}

/// Routes a status cell value into the time log.
///
/// `Start` opens an interval, `Stop` and `Completed` close one, anything
/// else is ignored. Returns what happened so the caller can tally.
async fn apply_status(
    pool: &sqlx::PgPool,
    record_number: &str,
    status: &str,
) -> Result<&'static str, DbError> {
    let now = Utc::now();
    match status.trim() {
        "Start" => {
            record_start(pool, record_number, now).await?;
            Ok("started")
        }
        "Stop" | "Completed" => {
            record_stop(pool, record_number, now).await?;
            Ok("stopped")
        }
        _ => Ok("ignored"),
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(super) async fn smartsheet_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    // Verification handshake: echo the challenge in header and body.
    if let Some(challenge) = headers.get(CHALLENGE_HEADER).and_then(|v| v.to_str().ok()) {
        let body = serde_json::json!({ "smartsheetHookResponse": challenge });
        let mut response = (StatusCode::OK, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(challenge) {
            response
                .headers_mut()
                .insert(CHALLENGE_RESPONSE_HEADER, value);
        }
        return response;
    }

    let callback: WebhookCallback = match serde_json::from_value(payload) {
        Ok(cb) => cb,
        Err(e) => {
            tracing::warn!(error = %e, "webhook payload did not parse; acknowledging anyway");
            WebhookCallback { events: Vec::new() }
        }
    };

    let outcome = process_events(&state, callback.events).await;
    (
        StatusCode::OK,
        Json(ApiResponse {
            data: outcome,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
        .into_response()
}

async fn process_events(state: &AppState, events: Vec<WebhookEvent>) -> WebhookOutcome {
    let mut outcome = WebhookOutcome::default();
    if events.is_empty() {
        return outcome;
    }

    let Some(sheet_id) = state.config.sheets.task_tracker else {
        tracing::warn!("webhook events received but no task tracker sheet is configured");
        return outcome;
    };

    // One sheet fetch per callback resolves the Record # column for every
    // event in it.
    let record_column = match state.smartsheet.get_sheet(sheet_id).await {
        Ok(sheet) => match ColumnIndex::from_sheet(&sheet).require(RECORD_COLUMN) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, sheet_id, "task tracker sheet is missing its record column");
                outcome.errored = events.len();
                return outcome;
            }
        },
        Err(e) => {
            tracing::error!(error = %e, sheet_id, "failed to load task tracker sheet");
            outcome.errored = events.len();
            return outcome;
        }
    };

    for event in events {
        let (Some(row_id), Some(column_id)) = (event.row_id, event.column_id) else {
            outcome.ignored += 1;
            continue;
        };

        let row = match state.smartsheet.get_row(sheet_id, row_id).await {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(error = %e, row_id, "failed to fetch webhook row");
                outcome.errored += 1;
                continue;
            }
        };

        let status = row.cell_value(column_id).and_then(cell_text);
        let record_number = row.cell_value(record_column).and_then(cell_text);
        let (Some(status), Some(record_number)) = (status, record_number) else {
            outcome.ignored += 1;
            continue;
        };

        // Only events whose row and cells actually resolved count as
        // processed; every event lands in exactly one tally.
        outcome.processed += 1;
        match apply_status(&state.pool, &record_number, &status).await {
            Ok("started") => outcome.started += 1,
            Ok("stopped") => outcome.stopped += 1,
            Ok(_) => outcome.ignored += 1,
            Err(e) => {
                tracing::error!(error = %e, record_number, "time log write failed");
                outcome.errored += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::test_support;
    use tradesync_db::list_intervals;
    use tradesync_smartsheet::SmartsheetClient;

    #[tokio::test]
    async fn errored_row_fetch_is_not_counted_as_processed() {
        let server = MockServer::start().await;

        let sheet = serde_json::json!({
            "id": 77,
            "name": "task tracker",
            "columns": [ { "id": 5, "title": "Record #" } ],
            "rows": []
        });
        Mock::given(method("GET"))
            .and(path("/sheets/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&sheet))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sheets/77/rows/901"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut state = test_support::lazy_state();
        let mut config = (*state.config).clone();
        config.sheets.task_tracker = Some(77);
        state.config = Arc::new(config);
        state.smartsheet = Arc::new(
            SmartsheetClient::with_base_url("test-token", 1, &server.uri()).expect("client"),
        );

        let events = vec![WebhookEvent {
            row_id: Some(901),
            column_id: Some(5),
        }];
        let outcome = process_events(&state, events).await;

        assert_eq!(outcome.errored, 1);
        assert_eq!(outcome.processed, 0, "a failed event is errored, not processed");
        assert_eq!(outcome.ignored, 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn start_status_opens_an_interval(pool: sqlx::PgPool) {
        let outcome = apply_status(&pool, "TT-1", "Start").await.expect("apply");
        assert_eq!(outcome, "started");

        let intervals = list_intervals(&pool, "TT-1").await.expect("intervals");
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].stopped_at.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn completed_status_closes_the_interval(pool: sqlx::PgPool) {
        apply_status(&pool, "TT-1", "Start").await.expect("start");
        let outcome = apply_status(&pool, "TT-1", "Completed")
            .await
            .expect("complete");
        assert_eq!(outcome, "stopped");

        let intervals = list_intervals(&pool, "TT-1").await.expect("intervals");
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].stopped_at.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn other_statuses_do_not_touch_the_log(pool: sqlx::PgPool) {
        let outcome = apply_status(&pool, "TT-1", "In Progress")
            .await
            .expect("apply");
        assert_eq!(outcome, "ignored");
        assert!(tradesync_db::get_task_record(&pool, "TT-1").await.is_err());
    }

    #[test]
    fn cell_text_handles_scalars_only() {
        assert_eq!(cell_text(&serde_json::json!("Start")), Some("Start".into()));
        assert_eq!(cell_text(&serde_json::json!(42)), Some("42".into()));
        assert_eq!(cell_text(&serde_json::json!(["Start"])), None);
    }
}
