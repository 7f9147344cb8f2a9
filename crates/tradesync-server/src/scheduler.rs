//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring deletion-status scan when it is enabled.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use tradesync_core::AppConfig;
use tradesync_engine::{scan_sheet, ScanSummary};
use tradesync_simpro::SimproClient;
use tradesync_smartsheet::SmartsheetClient;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the scan cron expression does not parse, or the scheduler fails to
/// start.
pub async fn build_scheduler(
    config: Arc<AppConfig>,
    simpro: Arc<SimproClient>,
    smartsheet: Arc<SmartsheetClient>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if config.scan_enabled {
        register_scan_job(&scheduler, config, simpro, smartsheet).await?;
    } else {
        tracing::info!("scheduled deletion-status scan disabled");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring deletion-status scan at the configured cron
/// schedule (daily at midnight by default).
async fn register_scan_job(
    scheduler: &JobScheduler,
    config: Arc<AppConfig>,
    simpro: Arc<SimproClient>,
    smartsheet: Arc<SmartsheetClient>,
) -> Result<(), JobSchedulerError> {
    let cron = config.scan_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let config = Arc::clone(&config);
        let simpro = Arc::clone(&simpro);
        let smartsheet = Arc::clone(&smartsheet);

        Box::pin(async move {
            tracing::info!("scheduler: starting deletion-status scan");
            run_scan_job(&config, &simpro, &smartsheet).await;
            tracing::info!("scheduler: deletion-status scan complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Scan every configured tracking sheet, swallowing failures so a broken
/// sheet never kills the scheduler.
async fn run_scan_job(config: &AppConfig, simpro: &SimproClient, smartsheet: &SmartsheetClient) {
    let sheet_ids: Vec<i64> = config
        .sheets
        .scan_active
        .into_iter()
        .chain(config.sheets.scan_archived)
        .collect();

    if sheet_ids.is_empty() {
        tracing::warn!("scheduler: scan enabled but no tracking sheet is configured");
        return;
    }

    let mut total = ScanSummary::default();
    for sheet_id in sheet_ids {
        match scan_sheet(simpro, smartsheet, sheet_id, None).await {
            Ok(summary) => total.merge(summary),
            Err(e) => {
                tracing::error!(error = %e, sheet_id, "scheduler: scan failed for sheet");
            }
        }
    }

    tracing::info!(
        checked = total.checked,
        confirmed_deleted = total.confirmed_deleted,
        confirmed_active = total.confirmed_active,
        errored = total.errored,
        rows_written = total.rows_written,
        "scheduler: scan totals"
    );
}
