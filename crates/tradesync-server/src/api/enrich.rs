//! On-demand column refreshes pulled from Simpro detail lookups:
//! `PUT /api/v1/sheets/site-suburbs` and `PUT /api/v1/sheets/wip-amounts`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use tradesync_engine::{refresh_site_suburbs, refresh_wip_amounts};

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct EnrichParams {
    /// Override the configured destination sheet.
    sheet_id: Option<i64>,
}

pub(super) async fn site_suburb_refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<EnrichParams>,
) -> Response {
    let Some(sheet_id) = params.sheet_id.or(state.config.sheets.schedules_active) else {
        return ApiError::new(
            req_id.0,
            "bad_request",
            "no sheet configured; pass sheet_id or set SCHEDULES_ACTIVE_SHEET_ID",
        )
        .into_response();
    };

    match refresh_site_suburbs(state.simpro.as_ref(), state.smartsheet.as_ref(), sheet_id).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: summary,
                meta: ResponseMeta::new(req_id.0),
            }),
        )
            .into_response(),
        Err(e) => map_engine_error(req_id.0, &e).into_response(),
    }
}

pub(super) async fn wip_amount_refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<EnrichParams>,
) -> Response {
    let Some(sheet_id) = params.sheet_id.or(state.config.sheets.cost_centers_active) else {
        return ApiError::new(
            req_id.0,
            "bad_request",
            "no sheet configured; pass sheet_id or set COST_CENTERS_ACTIVE_SHEET_ID",
        )
        .into_response();
    };

    match refresh_wip_amounts(state.simpro.as_ref(), state.smartsheet.as_ref(), sheet_id).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: summary,
                meta: ResponseMeta::new(req_id.0),
            }),
        )
            .into_response(),
        Err(e) => map_engine_error(req_id.0, &e).into_response(),
    }
}
