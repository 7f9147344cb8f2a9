use thiserror::Error;

use tradesync_simpro::SimproError;
use tradesync_smartsheet::SmartsheetError;

/// Hard failures that abort a reconciliation run or scan.
///
/// Per-key, per-row, and per-chunk failures never surface here; they are
/// collected into the run summary instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The initial source fetch failed; without it there is nothing to
    /// reconcile.
    #[error("source fetch failed: {0}")]
    Source(#[from] SimproError),

    /// A destination sheet could not be loaded or is missing a required
    /// column.
    #[error("destination sheet error: {0}")]
    Destination(#[from] SmartsheetError),

    /// The entity has no configured destination sheet.
    #[error("no destination sheet configured for {entity}")]
    NotConfigured { entity: String },
}
