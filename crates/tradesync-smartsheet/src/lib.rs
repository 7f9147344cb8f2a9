//! Smartsheet REST API client used by the reconciliation engine.

mod client;
mod error;
pub mod types;

pub use client::SmartsheetClient;
pub use error::SmartsheetError;
pub use types::ColumnIndex;
