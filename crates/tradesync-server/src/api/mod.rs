mod enrich;
mod scans;
mod sync;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use tradesync_core::{AppConfig, EntityKind};
use tradesync_simpro::SimproClient;
use tradesync_smartsheet::SmartsheetClient;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

/// One mutex per entity so concurrent triggers serialize instead of racing
/// the same sheets.
#[derive(Debug, Default)]
pub struct RunGuards {
    schedules: Mutex<()>,
    quotes: Mutex<()>,
    leads: Mutex<()>,
    cost_centers: Mutex<()>,
}

impl RunGuards {
    pub fn for_entity(&self, kind: EntityKind) -> &Mutex<()> {
        match kind {
            EntityKind::Schedules => &self.schedules,
            EntityKind::Quotes => &self.quotes,
            EntityKind::Leads => &self.leads,
            EntityKind::CostCenters => &self.cost_centers,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub simpro: Arc<SimproClient>,
    pub smartsheet: Arc<SmartsheetClient>,
    pub run_guards: Arc<RunGuards>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_engine_error(
    request_id: String,
    error: &tradesync_engine::EngineError,
) -> ApiError {
    tracing::error!(error = %error, "engine run failed");
    match error {
        tradesync_engine::EngineError::NotConfigured { entity } => ApiError::new(
            request_id,
            "bad_request",
            format!("no destination sheet configured for {entity}"),
        ),
        _ => ApiError::new(request_id, "internal_error", error.to_string()),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/sync/{entity}", post(sync::trigger_sync))
        .route(
            "/api/v1/scans/schedule-deletion",
            get(scans::schedule_deletion_scan),
        )
        .route(
            "/api/v1/sheets/site-suburbs",
            put(enrich::site_suburb_refresh),
        )
        .route("/api/v1/sheets/wip-amounts", put(enrich::wip_amount_refresh))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    // The webhook endpoint stays public: Smartsheet authenticates itself via
    // the challenge handshake, not a bearer token.
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/webhooks/smartsheet",
            post(webhook::smartsheet_webhook),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match tradesync_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}


#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let state = test_support::lazy_state();
        let auth = AuthState::from_config(&state.config).expect("auth");
        build_app(state, auth, default_rate_limit_state())
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_challenge_is_echoed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhooks/smartsheet")
                    .header("content-type", "application/json")
                    .header("Smartsheet-Hook-Challenge", "abc-123")
                    .body(Body::from(r#"{"challenge":"abc-123"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("Smartsheet-Hook-Response")
                .and_then(|v| v.to_str().ok()),
            Some("abc-123")
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["smartsheetHookResponse"], "abc-123");
    }

    #[tokio::test]
    async fn sync_rejects_unknown_entity() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/invoices")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_rejects_unconfigured_entity() {
        // lazy_state carries no sheet ids at all.
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync/quotes")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn suburb_refresh_requires_a_sheet_id() {
        // lazy_state carries no sheet ids, so the route must refuse rather
        // than fall through to a nonexistent sheet.
        let response = app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/sheets/site-suburbs")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wip_refresh_requires_a_sheet_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/sheets/wip-amounts")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scan_requires_a_sheet_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/scans/schedule-deletion")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
