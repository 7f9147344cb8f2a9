//! On-demand deletion-status scan: `GET /api/v1/scans/schedule-deletion`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use tradesync_engine::{scan_sheet, ScanSummary};

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct ScanParams {
    /// Restrict the scan to one schedule id (spot check).
    schedule_id: Option<i64>,
    /// Override the configured active tracking sheet.
    active_sheet_id: Option<i64>,
    /// Override the configured archived tracking sheet.
    archived_sheet_id: Option<i64>,
}

pub(super) async fn schedule_deletion_scan(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ScanParams>,
) -> Response {
    let active = params.active_sheet_id.or(state.config.sheets.scan_active);
    let archived = params
        .archived_sheet_id
        .or(state.config.sheets.scan_archived);

    let sheet_ids: Vec<i64> = active.into_iter().chain(archived).collect();
    if sheet_ids.is_empty() {
        return ApiError::new(
            req_id.0,
            "bad_request",
            "no tracking sheet configured; pass active_sheet_id or set SCAN_ACTIVE_SHEET_ID",
        )
        .into_response();
    }

    let mut total = ScanSummary::default();
    for sheet_id in sheet_ids {
        match scan_sheet(
            state.simpro.as_ref(),
            state.smartsheet.as_ref(),
            sheet_id,
            params.schedule_id,
        )
        .await
        {
            Ok(summary) => total.merge(summary),
            Err(e) => return map_engine_error(req_id.0, &e).into_response(),
        }
    }

    (
        StatusCode::OK,
        Json(ApiResponse {
            data: total,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
        .into_response()
}
