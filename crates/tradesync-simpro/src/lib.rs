//! Simpro REST API client used by the reconciliation engine.

mod client;
mod error;
mod retry;
pub mod types;

pub use client::SimproClient;
pub use error::SimproError;
