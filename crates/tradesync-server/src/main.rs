mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tradesync_simpro::SimproClient;
use tradesync_smartsheet::SmartsheetClient;

use crate::{
    api::{build_app, default_rate_limit_state, AppState, RunGuards},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(tradesync_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tradesync_db::PoolConfig {
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    };
    let pool = tradesync_db::connect_pool(&config.database_url, pool_config).await?;
    tradesync_db::run_migrations(&pool).await?;

    let simpro = Arc::new(SimproClient::new(
        &config.simpro_base_url,
        &config.simpro_api_key,
        config.http_timeout_secs,
        config.simpro_max_retries,
        config.simpro_retry_backoff_ms,
    )?);
    let smartsheet = Arc::new(SmartsheetClient::new(
        &config.smartsheet_access_token,
        config.http_timeout_secs,
    )?);

    let _scheduler = scheduler::build_scheduler(
        Arc::clone(&config),
        Arc::clone(&simpro),
        Arc::clone(&smartsheet),
    )
    .await?;

    let auth = AuthState::from_config(&config)?;
    let app = build_app(
        AppState {
            pool,
            config: Arc::clone(&config),
            simpro,
            smartsheet,
            run_guards: Arc::new(RunGuards::default()),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
