use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tradesync_core::{EntityKind, SheetPair};
use tradesync_engine::sources::{CostCenterSource, LeadSource, QuoteSource, ScheduleSource};
use tradesync_engine::{run_sync, scan_sheet, EntitySource, ScanSummary};
use tradesync_simpro::SimproClient;
use tradesync_smartsheet::SmartsheetClient;

#[derive(Debug, Parser)]
#[command(name = "tradesync-cli")]
#[command(about = "Simpro to Smartsheet reconciliation tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one reconciliation pass for an entity.
    Sync {
        /// schedules, quotes, leads, or cost-centers
        entity: String,
    },
    /// Run the schedule deletion-status scan over the tracking sheets.
    Scan {
        /// Restrict the scan to one schedule id.
        #[arg(long)]
        schedule_id: Option<i64>,
        /// Override the configured active tracking sheet.
        #[arg(long)]
        active_sheet_id: Option<i64>,
        /// Override the configured archived tracking sheet.
        #[arg(long)]
        archived_sheet_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = tradesync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let simpro = SimproClient::new(
        &config.simpro_base_url,
        &config.simpro_api_key,
        config.http_timeout_secs,
        config.simpro_max_retries,
        config.simpro_retry_backoff_ms,
    )?;
    let smartsheet = SmartsheetClient::new(
        &config.smartsheet_access_token,
        config.http_timeout_secs,
    )?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync { entity } => {
            let kind: EntityKind = entity
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("unknown entity; expected schedules, quotes, leads, or cost-centers")?;
            let pair = SheetPair::from_ids(kind, &config.sheets).with_context(|| {
                format!("no destination sheet configured for {kind}; set its sheet id env var")
            })?;
            tracing::info!(entity = %kind, "starting reconciliation run");
            let summary = run_sync(
                &source_for(kind, &simpro, config.schedule_window_days),
                &smartsheet,
                &pair,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Scan {
            schedule_id,
            active_sheet_id,
            archived_sheet_id,
        } => {
            let active = active_sheet_id.or(config.sheets.scan_active);
            let archived = archived_sheet_id.or(config.sheets.scan_archived);
            let sheet_ids: Vec<i64> = active.into_iter().chain(archived).collect();
            anyhow::ensure!(
                !sheet_ids.is_empty(),
                "no tracking sheet configured; pass --active-sheet-id or set SCAN_ACTIVE_SHEET_ID"
            );

            let mut total = ScanSummary::default();
            for sheet_id in sheet_ids {
                tracing::info!(sheet_id, "scanning tracking sheet");
                let summary = scan_sheet(&simpro, &smartsheet, sheet_id, schedule_id)
                    .await
                    .with_context(|| format!("scan failed for sheet {sheet_id}"))?;
                total.merge(summary);
            }
            println!("{}", serde_json::to_string_pretty(&total)?);
        }
    }

    Ok(())
}

/// One enum to keep `run_sync` call sites monomorphic per entity.
enum AnySource<'a> {
    Schedules(ScheduleSource<'a>),
    Quotes(QuoteSource<'a>),
    Leads(LeadSource<'a>),
    CostCenters(CostCenterSource<'a>),
}

fn source_for(kind: EntityKind, simpro: &SimproClient, window_days: i64) -> AnySource<'_> {
    match kind {
        EntityKind::Schedules => AnySource::Schedules(ScheduleSource::new(simpro, window_days)),
        EntityKind::Quotes => AnySource::Quotes(QuoteSource::new(simpro)),
        EntityKind::Leads => AnySource::Leads(LeadSource::new(simpro)),
        EntityKind::CostCenters => AnySource::CostCenters(CostCenterSource::new(simpro)),
    }
}

impl EntitySource for AnySource<'_> {
    fn entity(&self) -> EntityKind {
        match self {
            AnySource::Schedules(s) => s.entity(),
            AnySource::Quotes(s) => s.entity(),
            AnySource::Leads(s) => s.entity(),
            AnySource::CostCenters(s) => s.entity(),
        }
    }

    async fn list_current(
        &self,
    ) -> Result<Vec<tradesync_core::SourceRow>, tradesync_simpro::SimproError> {
        match self {
            AnySource::Schedules(s) => s.list_current().await,
            AnySource::Quotes(s) => s.list_current().await,
            AnySource::Leads(s) => s.list_current().await,
            AnySource::CostCenters(s) => s.list_current().await,
        }
    }

    async fn fetch_by_keys(
        &self,
        keys: &[tradesync_core::RecordKey],
    ) -> Result<Vec<tradesync_core::SourceRow>, tradesync_simpro::SimproError> {
        match self {
            AnySource::Schedules(s) => s.fetch_by_keys(keys).await,
            AnySource::Quotes(s) => s.fetch_by_keys(keys).await,
            AnySource::Leads(s) => s.fetch_by_keys(keys).await,
            AnySource::CostCenters(s) => s.fetch_by_keys(keys).await,
        }
    }

    async fn probe(
        &self,
        keys: &[tradesync_core::RecordKey],
    ) -> Vec<(
        tradesync_core::RecordKey,
        Result<
            tradesync_engine::validate::ProbeOutcome,
            tradesync_engine::validate::ProbeError,
        >,
    )> {
        match self {
            AnySource::Schedules(s) => s.probe(keys).await,
            AnySource::Quotes(s) => s.probe(keys).await,
            AnySource::Leads(s) => s.probe(keys).await,
            AnySource::CostCenters(s) => s.probe(keys).await,
        }
    }
}
