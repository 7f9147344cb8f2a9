//! Deletion-status scan: walk a schedule tracking sheet, re-query each row's
//! schedule at the source, and record the verdict in the `ISDeleted` column.

use serde::Serialize;
use serde_json::Value;

use tradesync_core::chunk::COMMENT_CHUNK_SIZE;
use tradesync_smartsheet::types::{CellWrite, Row, RowUpdate};
use tradesync_smartsheet::ColumnIndex;
use tradesync_simpro::types::SchedulePath;

use crate::error::EngineError;
use crate::traits::{ScheduleProbe, SheetApi};
use crate::writer::WriteError;

pub const SCHEDULE_ID_COLUMN: &str = "ID-Schedule";
pub const JOB_ID_COLUMN: &str = "ID-Job";
pub const SECTION_ID_COLUMN: &str = "ID-Section";
pub const COST_CENTER_ID_COLUMN: &str = "ID-CostCentre";
pub const IS_DELETED_COLUMN: &str = "ISDeleted";

/// A row whose lookup failed; the scan records nothing for it this pass.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub row_id: i64,
    pub message: String,
}

/// Tallies for one scan pass, or several merged together.
#[derive(Debug, Default, Serialize)]
pub struct ScanSummary {
    pub checked: usize,
    pub confirmed_deleted: usize,
    pub confirmed_active: usize,
    pub errored: usize,
    pub rows_written: usize,
    pub errors: Vec<RowError>,
    pub write_errors: Vec<WriteError>,
}

impl ScanSummary {
    pub fn merge(&mut self, other: ScanSummary) {
        self.checked += other.checked;
        self.confirmed_deleted += other.confirmed_deleted;
        self.confirmed_active += other.confirmed_active;
        self.errored += other.errored;
        self.rows_written += other.rows_written;
        self.errors.extend(other.errors);
        self.write_errors.extend(other.write_errors);
    }
}

pub(crate) fn cell_i64(row: &Row, column_id: i64) -> Option<i64> {
    match row.cell_value(column_id)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().and_then(|f| {
                if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(f as i64)
                } else {
                    None
                }
            })
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

struct ScanColumns {
    schedule_id: i64,
    job_id: i64,
    section_id: i64,
    cost_center_id: i64,
    is_deleted: i64,
}

impl ScanColumns {
    fn resolve(index: &ColumnIndex) -> Result<Self, EngineError> {
        Ok(Self {
            schedule_id: index.require(SCHEDULE_ID_COLUMN)?,
            job_id: index.require(JOB_ID_COLUMN)?,
            section_id: index.require(SECTION_ID_COLUMN)?,
            cost_center_id: index.require(COST_CENTER_ID_COLUMN)?,
            is_deleted: index.require(IS_DELETED_COLUMN)?,
        })
    }
}

/// Scans one tracking sheet, probing each row's schedule under its cost
/// center path and writing `"Yes"` / `"No"` into the `ISDeleted` column.
///
/// Rows missing any of the four id cells are skipped silently; they are
/// placeholders, not errors. With `only_schedule` set, every other row is
/// ignored, which backs the single-schedule spot check.
pub async fn scan_sheet<P, D>(
    probe: &P,
    dest: &D,
    sheet_id: i64,
    only_schedule: Option<i64>,
) -> Result<ScanSummary, EngineError>
where
    P: ScheduleProbe,
    D: SheetApi,
{
    let sheet = dest.get_sheet(sheet_id).await?;
    let index = ColumnIndex::from_sheet(&sheet);
    let columns = ScanColumns::resolve(&index)?;

    let mut summary = ScanSummary::default();
    let mut updates = Vec::new();

    for row in &sheet.rows {
        let Some(schedule_id) = cell_i64(row, columns.schedule_id) else {
            continue;
        };
        if only_schedule.is_some_and(|wanted| wanted != schedule_id) {
            continue;
        }
        let (Some(job_id), Some(section_id), Some(cost_center_id)) = (
            cell_i64(row, columns.job_id),
            cell_i64(row, columns.section_id),
            cell_i64(row, columns.cost_center_id),
        ) else {
            continue;
        };

        summary.checked += 1;
        let path = SchedulePath {
            job_id,
            section_id,
            cost_center_id,
        };
        match probe.schedule_exists(path, schedule_id).await {
            Ok(exists) => {
                let verdict = if exists {
                    summary.confirmed_active += 1;
                    "No"
                } else {
                    summary.confirmed_deleted += 1;
                    "Yes"
                };
                updates.push(RowUpdate {
                    id: row.id,
                    cells: vec![CellWrite {
                        column_id: columns.is_deleted,
                        value: Value::String(verdict.to_owned()),
                    }],
                });
            }
            Err(e) => {
                summary.errored += 1;
                summary.errors.push(RowError {
                    row_id: row.id,
                    message: e.to_string(),
                });
            }
        }
    }

    let (written, errors) =
        crate::writer::submit_updates(dest, sheet_id, &updates, COMMENT_CHUNK_SIZE).await;
    summary.rows_written = written;
    summary.write_errors = errors;

    tracing::info!(
        sheet_id,
        checked = summary.checked,
        confirmed_deleted = summary.confirmed_deleted,
        confirmed_active = summary.confirmed_active,
        errored = summary.errored,
        rows_written = summary.rows_written,
        "deletion-status scan complete"
    );
    Ok(summary)
}
