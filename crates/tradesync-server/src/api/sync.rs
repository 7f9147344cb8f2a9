//! Manual sync triggers: `POST /api/v1/sync/{entity}`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use tradesync_core::{EntityKind, SheetPair};
use tradesync_engine::{run_sync, EngineError, RunSummary};
use tradesync_engine::sources::{CostCenterSource, LeadSource, QuoteSource, ScheduleSource};

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(entity): Path<String>,
) -> Response {
    let Ok(kind) = entity.parse::<EntityKind>() else {
        return ApiError::new(
            req_id.0,
            "bad_request",
            format!("unknown entity '{entity}'"),
        )
        .into_response();
    };

    let Some(pair) = SheetPair::from_ids(kind, &state.config.sheets) else {
        let e = EngineError::NotConfigured {
            entity: kind.to_string(),
        };
        return map_engine_error(req_id.0, &e).into_response();
    };

    // One run per entity at a time; a second trigger gets a 409 instead of
    // racing the same sheets.
    let guard = state.run_guards.for_entity(kind);
    let Ok(_lock) = guard.try_lock() else {
        return ApiError::new(
            req_id.0,
            "conflict",
            format!("a sync for {kind} is already running"),
        )
        .into_response();
    };

    tracing::info!(entity = %kind, "manual sync triggered");
    let dest = state.smartsheet.as_ref();
    let result: Result<RunSummary, EngineError> = match kind {
        EntityKind::Schedules => {
            let source =
                ScheduleSource::new(state.simpro.as_ref(), state.config.schedule_window_days);
            run_sync(&source, dest, &pair).await
        }
        EntityKind::Quotes => {
            let source = QuoteSource::new(state.simpro.as_ref());
            run_sync(&source, dest, &pair).await
        }
        EntityKind::Leads => {
            let source = LeadSource::new(state.simpro.as_ref());
            run_sync(&source, dest, &pair).await
        }
        EntityKind::CostCenters => {
            let source = CostCenterSource::new(state.simpro.as_ref());
            run_sync(&source, dest, &pair).await
        }
    };

    match result {
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

