//! Request middleware: request ids, bearer auth, per-caller rate limiting.
//!
//! Auth and rate-limit rejections reuse the [`ApiError`] envelope so every
//! error body on the API has the same shape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use tradesync_core::{AppConfig, Environment};

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Accepted bearer tokens for the protected routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth state from the loaded configuration.
    ///
    /// Development and test environments may run without keys (auth is
    /// disabled with a warning); production startup fails instead.
    ///
    /// # Errors
    ///
    /// Fails when no keys are configured outside development/test.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let local = matches!(config.env, Environment::Development | Environment::Test);
        Self::from_keys(&config.api_keys, local)
    }

    fn from_keys(keys: &[String], allow_unauthenticated: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = keys.iter().cloned().collect();

        if keys.is_empty() {
            anyhow::ensure!(
                allow_unauthenticated,
                "TRADESYNC_API_KEYS must list at least one bearer token outside development"
            );
            tracing::warn!("no api keys configured; bearer auth disabled for local runs");
            return Ok(Self {
                keys: Arc::new(HashSet::new()),
                enabled: false,
            });
        }

        Ok(Self {
            keys: Arc::new(keys),
            enabled: true,
        })
    }

    fn allows(&self, token: &str) -> bool {
        self.keys.contains(token)
    }
}

struct CallerWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window request limiter, one window per caller.
///
/// Callers are keyed by bearer token; requests without one share an
/// anonymous bucket. Expired windows are pruned on each pass so the map
/// stays bounded by the number of live callers.
#[derive(Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, CallerWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn try_acquire(&self, caller: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        windows.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let entry = windows
            .entry(caller.to_owned())
            .or_insert_with(|| CallerWindow {
                started_at: now,
                count: 0,
            });
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_owned(), |id| id.0.clone())
}

/// Attaches a request id: the incoming `x-request-id` header when present,
/// a fresh `UUIDv4` otherwise. Stored as a [`RequestId`] extension and
/// echoed on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", value);
    }
    res
}

/// Rejects requests without a configured bearer token, unless auth is
/// disabled for local runs.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match bearer_token(req.headers()) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Enforces the per-caller request budget.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = bearer_token(req.headers()).unwrap_or("anonymous").to_owned();

    if rate_limit.try_acquire(&caller).await {
        next.run(req).await
    } else {
        ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded").into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
