//! Trait wiring for the production clients.

use tradesync_simpro::types::{CostCenterFinancials, SchedulePath};
use tradesync_simpro::{SimproClient, SimproError};
use tradesync_smartsheet::types::{NewRow, RowUpdate, Sheet};
use tradesync_smartsheet::{SmartsheetClient, SmartsheetError};

use crate::traits::{CostCenterFinance, ScheduleProbe, SheetApi, SiteDirectory};

impl SheetApi for SmartsheetClient {
    async fn get_sheet(&self, sheet_id: i64) -> Result<Sheet, SmartsheetError> {
        SmartsheetClient::get_sheet(self, sheet_id).await
    }

    async fn add_rows(&self, sheet_id: i64, rows: &[NewRow]) -> Result<usize, SmartsheetError> {
        let ack = SmartsheetClient::add_rows(self, sheet_id, rows).await?;
        Ok(ack.result.len())
    }

    async fn update_rows(
        &self,
        sheet_id: i64,
        rows: &[RowUpdate],
    ) -> Result<usize, SmartsheetError> {
        let ack = SmartsheetClient::update_rows(self, sheet_id, rows).await?;
        Ok(ack.result.len())
    }
}

impl SiteDirectory for SimproClient {
    async fn site_suburb(&self, site_id: i64) -> Result<Option<String>, SimproError> {
        let site = self.get_site(site_id).await?;
        Ok(site.and_then(|s| s.suburb().map(ToOwned::to_owned)))
    }
}

impl CostCenterFinance for SimproClient {
    async fn cost_center_financials(
        &self,
        path: SchedulePath,
    ) -> Result<Option<CostCenterFinancials>, SimproError> {
        self.get_cost_center_financials(path).await
    }
}

impl ScheduleProbe for SimproClient {
    async fn schedule_exists(
        &self,
        path: SchedulePath,
        schedule_id: i64,
    ) -> Result<bool, SimproError> {
        let found = self.get_cost_center_schedule(path, schedule_id).await?;
        Ok(found.is_some())
    }
}
