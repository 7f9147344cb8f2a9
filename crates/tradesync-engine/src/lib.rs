//! Reconciliation engine: compares Simpro's view of an entity with its
//! destination sheets and converges the sheets toward the source.
//!
//! The engine is generic over [`EntitySource`] and [`SheetApi`]; the
//! production implementations over the real clients live in [`sources`] and
//! `dest`.

mod dest;
pub mod enrich;
mod error;
pub mod identity;
pub mod partition;
pub mod run;
pub mod scan;
pub mod sources;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;
pub mod validate;
pub mod writer;

pub use enrich::{refresh_site_suburbs, refresh_wip_amounts, EnrichSummary};
pub use error::EngineError;
pub use run::{run_sync, RunSummary};
pub use scan::{scan_sheet, ScanSummary};
pub use traits::{CostCenterFinance, EntitySource, ScheduleProbe, SheetApi, SiteDirectory};
