//! Deletion validation: distinguish "filtered out of the scoped list query"
//! from "actually deleted" by re-querying the source per candidate key.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use tradesync_core::RecordKey;
use tradesync_simpro::SimproError;

/// Verdict for one probed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    Absent,
}

/// A probe failure, detached from the underlying client error so one batch
/// failure can be attributed to every key in the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProbeError {
    pub message: String,
    pub not_found: bool,
}

impl From<SimproError> for ProbeError {
    fn from(e: SimproError) -> Self {
        Self {
            message: e.to_string(),
            not_found: e.is_not_found(),
        }
    }
}

impl From<&SimproError> for ProbeError {
    fn from(e: &SimproError) -> Self {
        Self {
            message: e.to_string(),
            not_found: e.is_not_found(),
        }
    }
}

/// A failure isolated to a single key; never aborts the batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyError {
    pub key: RecordKey,
    pub message: String,
}

/// Result of validating one sheet's deletion candidates.
#[derive(Debug, Default)]
pub struct DeletionVerdicts {
    /// Confirmed gone from the source; these form the final deletion set.
    pub confirmed_absent: BTreeSet<RecordKey>,
    /// Still present in the source; rejoined to the update set.
    pub confirmed_existing: BTreeSet<RecordKey>,
    /// Keys whose lookup failed for reasons other than NotFound.
    pub errors: Vec<KeyError>,
}

/// Aggregates per-key probe results into verdicts.
///
/// NotFound-class failures confirm absence; any other error parks the key in
/// `errors`, leaving it out of both the deletion and the update sets for
/// this run.
pub fn collect_verdicts<I>(results: I) -> DeletionVerdicts
where
    I: IntoIterator<Item = (RecordKey, Result<ProbeOutcome, ProbeError>)>,
{
    let mut verdicts = DeletionVerdicts::default();
    for (key, result) in results {
        match result {
            Ok(ProbeOutcome::Exists) => {
                verdicts.confirmed_existing.insert(key);
            }
            Ok(ProbeOutcome::Absent) => {
                verdicts.confirmed_absent.insert(key);
            }
            Err(e) if e.not_found => {
                verdicts.confirmed_absent.insert(key);
            }
            Err(e) => {
                verdicts.errors.push(KeyError {
                    key,
                    message: e.message,
                });
            }
        }
    }
    verdicts
}
