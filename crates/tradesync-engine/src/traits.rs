//! Seams between the engine and the two external systems.
//!
//! The engine is generic over these traits so its logic can be exercised
//! against in-memory fakes; production wiring lives in [`crate::sources`]
//! and [`crate::dest`].

use tradesync_core::{EntityKind, RecordKey, SourceRow};
use tradesync_simpro::types::{CostCenterFinancials, SchedulePath};
use tradesync_simpro::SimproError;
use tradesync_smartsheet::types::{NewRow, RowUpdate, Sheet};
use tradesync_smartsheet::SmartsheetError;

use crate::validate::{ProbeError, ProbeOutcome};

/// Read side of one reconcilable entity in the source system.
#[allow(async_fn_in_trait)]
pub trait EntitySource {
    fn entity(&self) -> EntityKind;

    /// The scoped list query driving the run, e.g. schedules inside the date
    /// window.
    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError>;

    /// Unscoped re-fetch of specific keys, used to rejoin confirmed-existing
    /// deletion candidates to the update set.
    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError>;

    /// Per-key existence verdicts for deletion candidates. Implementations
    /// batch where the API allows and must report failures per key, never by
    /// failing the whole call.
    async fn probe(&self, keys: &[RecordKey])
        -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)>;
}

/// Write side of the destination sheet service.
#[allow(async_fn_in_trait)]
pub trait SheetApi {
    async fn get_sheet(&self, sheet_id: i64) -> Result<Sheet, SmartsheetError>;

    /// Returns the number of rows written.
    async fn add_rows(&self, sheet_id: i64, rows: &[NewRow]) -> Result<usize, SmartsheetError>;

    /// Returns the number of rows written.
    async fn update_rows(
        &self,
        sheet_id: i64,
        rows: &[RowUpdate],
    ) -> Result<usize, SmartsheetError>;
}

/// Per-site address lookups backing the suburb refresh.
#[allow(async_fn_in_trait)]
pub trait SiteDirectory {
    /// The suburb (address city) of one site. `None` when the site is gone
    /// or its address carries no city.
    async fn site_suburb(&self, site_id: i64) -> Result<Option<String>, SimproError>;
}

/// Cost center claim and total figures, used by the WIP amount refresh.
#[allow(async_fn_in_trait)]
pub trait CostCenterFinance {
    async fn cost_center_financials(
        &self,
        path: SchedulePath,
    ) -> Result<Option<CostCenterFinancials>, SimproError>;
}

/// Direct schedule existence lookup by composite path, used by the
/// deletion-status scan.
#[allow(async_fn_in_trait)]
pub trait ScheduleProbe {
    async fn schedule_exists(
        &self,
        path: SchedulePath,
        schedule_id: i64,
    ) -> Result<bool, SimproError>;
}
