//! Single-column refreshes that pull detail data from Simpro into an
//! already-populated sheet: site suburbs for schedule rows, claim and total
//! amounts for the roofing WIP sheet.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use tradesync_core::chunk::WRITE_CHUNK_SIZE;
use tradesync_simpro::types::SchedulePath;
use tradesync_smartsheet::types::{CellWrite, RowUpdate};
use tradesync_smartsheet::ColumnIndex;

use crate::error::EngineError;
use crate::scan::{cell_i64, RowError};
use crate::traits::{CostCenterFinance, SheetApi, SiteDirectory};
use crate::writer::WriteError;

pub const SITE_ID_COLUMN: &str = "SiteID";
pub const SUBURB_COLUMN: &str = "Suburb";

pub const WIP_JOB_ID_COLUMN: &str = "JobID";
pub const WIP_SECTION_ID_COLUMN: &str = "Job_Section.ID";
pub const WIP_COST_CENTER_ID_COLUMN: &str = "Cost_Center.ID";
pub const WIP_TOTAL_EX_TAX_COLUMN: &str = "CostCentre_Total_Ex.Tax";
pub const WIP_CLAIMED_PERCENT_COLUMN: &str = "Percentage Client Invoice Claimed (From Simpro)";

/// Tallies for one refresh pass.
#[derive(Debug, Default, Serialize)]
pub struct EnrichSummary {
    pub checked: usize,
    pub refreshed: usize,
    /// Rows whose source record exists but carries no value to write, or
    /// whose source record is gone.
    pub skipped: usize,
    pub errored: usize,
    pub rows_written: usize,
    pub errors: Vec<RowError>,
    pub write_errors: Vec<WriteError>,
}

/// Re-reads each row's site and writes its address city into the `Suburb`
/// column. Rows without a `SiteID` cell are ignored; sites are fetched once
/// each no matter how many rows share them.
pub async fn refresh_site_suburbs<S, D>(
    sites: &S,
    dest: &D,
    sheet_id: i64,
) -> Result<EnrichSummary, EngineError>
where
    S: SiteDirectory,
    D: SheetApi,
{
    let sheet = dest.get_sheet(sheet_id).await?;
    let index = ColumnIndex::from_sheet(&sheet);
    let site_id_col = index.require(SITE_ID_COLUMN)?;
    let suburb_col = index.require(SUBURB_COLUMN)?;

    let mut summary = EnrichSummary::default();
    let mut updates = Vec::new();
    let mut cache: HashMap<i64, Option<String>> = HashMap::new();

    for row in &sheet.rows {
        let Some(site_id) = cell_i64(row, site_id_col) else {
            continue;
        };
        summary.checked += 1;

        let suburb = match cache.get(&site_id) {
            Some(cached) => cached.clone(),
            None => match sites.site_suburb(site_id).await {
                Ok(found) => {
                    cache.insert(site_id, found.clone());
                    found
                }
                Err(e) => {
                    summary.errored += 1;
                    summary.errors.push(RowError {
                        row_id: row.id,
                        message: e.to_string(),
                    });
                    continue;
                }
            },
        };

        match suburb {
            Some(suburb) => {
                summary.refreshed += 1;
                updates.push(RowUpdate {
                    id: row.id,
                    cells: vec![CellWrite {
                        column_id: suburb_col,
                        value: Value::String(suburb),
                    }],
                });
            }
            None => summary.skipped += 1,
        }
    }

    let (written, errors) =
        crate::writer::submit_updates(dest, sheet_id, &updates, WRITE_CHUNK_SIZE).await;
    summary.rows_written = written;
    summary.write_errors = errors;

    tracing::info!(
        sheet_id,
        checked = summary.checked,
        refreshed = summary.refreshed,
        skipped = summary.skipped,
        errored = summary.errored,
        rows_written = summary.rows_written,
        "site suburb refresh complete"
    );
    Ok(summary)
}

fn number_cell(column_id: i64, value: f64) -> Option<CellWrite> {
    serde_json::Number::from_f64(value).map(|n| CellWrite {
        column_id,
        value: Value::Number(n),
    })
}

/// Re-reads each WIP row's cost center and refreshes the ex-tax total and
/// claimed-percentage columns. Rows missing any of the three id cells are
/// placeholders and get skipped silently.
pub async fn refresh_wip_amounts<F, D>(
    finance: &F,
    dest: &D,
    sheet_id: i64,
) -> Result<EnrichSummary, EngineError>
where
    F: CostCenterFinance,
    D: SheetApi,
{
    let sheet = dest.get_sheet(sheet_id).await?;
    let index = ColumnIndex::from_sheet(&sheet);
    let job_col = index.require(WIP_JOB_ID_COLUMN)?;
    let section_col = index.require(WIP_SECTION_ID_COLUMN)?;
    let cost_center_col = index.require(WIP_COST_CENTER_ID_COLUMN)?;
    let total_col = index.require(WIP_TOTAL_EX_TAX_COLUMN)?;
    let claimed_col = index.require(WIP_CLAIMED_PERCENT_COLUMN)?;

    let mut summary = EnrichSummary::default();
    let mut updates = Vec::new();

    for row in &sheet.rows {
        let (Some(job_id), Some(section_id), Some(cost_center_id)) = (
            cell_i64(row, job_col),
            cell_i64(row, section_col),
            cell_i64(row, cost_center_col),
        ) else {
            continue;
        };
        summary.checked += 1;

        let path = SchedulePath {
            job_id,
            section_id,
            cost_center_id,
        };
        let financials = match finance.cost_center_financials(path).await {
            Ok(found) => found,
            Err(e) => {
                summary.errored += 1;
                summary.errors.push(RowError {
                    row_id: row.id,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let mut cells = Vec::new();
        if let Some(f) = &financials {
            if let Some(cell) = f.total_ex_tax().and_then(|v| number_cell(total_col, v)) {
                cells.push(cell);
            }
            if let Some(cell) = f.claimed_percent().and_then(|v| number_cell(claimed_col, v)) {
                cells.push(cell);
            }
        }

        if cells.is_empty() {
            summary.skipped += 1;
        } else {
            summary.refreshed += 1;
            updates.push(RowUpdate { id: row.id, cells });
        }
    }

    let (written, errors) =
        crate::writer::submit_updates(dest, sheet_id, &updates, WRITE_CHUNK_SIZE).await;
    summary.rows_written = written;
    summary.write_errors = errors;

    tracing::info!(
        sheet_id,
        checked = summary.checked,
        refreshed = summary.refreshed,
        skipped = summary.skipped,
        errored = summary.errored,
        rows_written = summary.rows_written,
        "WIP amount refresh complete"
    );
    Ok(summary)
}
