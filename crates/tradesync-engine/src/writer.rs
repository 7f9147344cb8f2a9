//! Batch writing: convert source records into row payloads and submit them
//! in chunks, accumulating failures without rolling back prior successes.

use std::collections::BTreeMap;

use serde::Serialize;

use tradesync_core::chunk::chunks;
use tradesync_core::{RecordKey, SourceRow, DELETION_MARKER};
use tradesync_smartsheet::types::{CellWrite, NewRow, RowUpdate};
use tradesync_smartsheet::ColumnIndex;

use crate::traits::SheetApi;

/// A record that could not be converted into a row payload. Schema drift is
/// reported, not fatal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedRow {
    pub key: RecordKey,
    pub reason: String,
}

/// A chunk submission that failed. Prior chunks' successes stand.
#[derive(Debug, Clone, Serialize)]
pub struct WriteError {
    pub sheet_id: i64,
    pub chunk_index: usize,
    pub rows: usize,
    pub message: String,
}

fn convert_cells(record: &SourceRow, index: &ColumnIndex) -> Vec<CellWrite> {
    // Attributes with no matching column are dropped; the destination schema
    // leads, the source projection follows.
    record
        .attributes
        .iter()
        .filter_map(|(title, value)| {
            index.get(title).map(|column_id| CellWrite {
                column_id,
                value: value.clone(),
            })
        })
        .collect()
}

/// Converts records into add-rows payloads. A record none of whose
/// attributes map to a column is skipped with a reason.
#[must_use]
pub fn to_new_rows(records: &[SourceRow], index: &ColumnIndex) -> (Vec<NewRow>, Vec<SkippedRow>) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for record in records {
        let cells = convert_cells(record, index);
        if cells.is_empty() {
            skipped.push(SkippedRow {
                key: record.key.clone(),
                reason: "no attributes map to sheet columns".to_owned(),
            });
        } else {
            rows.push(NewRow::at_bottom(cells));
        }
    }
    (rows, skipped)
}

/// Converts records into update-rows payloads, resolving target row ids from
/// the identity map. Records without a destination row are skipped.
#[must_use]
pub fn to_row_updates(
    records: &[SourceRow],
    identities: &BTreeMap<RecordKey, i64>,
    index: &ColumnIndex,
) -> (Vec<RowUpdate>, Vec<SkippedRow>) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for record in records {
        let Some(row_id) = identities.get(&record.key) else {
            skipped.push(SkippedRow {
                key: record.key.clone(),
                reason: "no destination row for key".to_owned(),
            });
            continue;
        };
        let cells = convert_cells(record, index);
        if cells.is_empty() {
            skipped.push(SkippedRow {
                key: record.key.clone(),
                reason: "no attributes map to sheet columns".to_owned(),
            });
        } else {
            rows.push(RowUpdate {
                id: *row_id,
                cells,
            });
        }
    }
    (rows, skipped)
}

/// Builds the soft-delete comment updates for confirmed-absent keys.
#[must_use]
pub fn deletion_marker_updates(
    rows: &BTreeMap<RecordKey, i64>,
    comment_column_id: i64,
) -> Vec<RowUpdate> {
    rows.values()
        .map(|row_id| RowUpdate {
            id: *row_id,
            cells: vec![CellWrite {
                column_id: comment_column_id,
                value: serde_json::Value::String(DELETION_MARKER.to_owned()),
            }],
        })
        .collect()
}

/// Submits add-rows payloads in chunks of `chunk_size`, sequentially.
///
/// Returns the number of rows written and the per-chunk failures. A failed
/// chunk does not stop subsequent chunks.
pub async fn submit_adds<D: SheetApi>(
    dest: &D,
    sheet_id: i64,
    rows: &[NewRow],
    chunk_size: usize,
) -> (usize, Vec<WriteError>) {
    let mut written = 0;
    let mut errors = Vec::new();
    for (chunk_index, chunk) in chunks(rows, chunk_size).enumerate() {
        match dest.add_rows(sheet_id, chunk).await {
            Ok(count) => written += count,
            Err(e) => {
                tracing::error!(
                    sheet_id,
                    chunk_index,
                    rows = chunk.len(),
                    error = %e,
                    "add-rows chunk failed"
                );
                errors.push(WriteError {
                    sheet_id,
                    chunk_index,
                    rows: chunk.len(),
                    message: e.to_string(),
                });
            }
        }
    }
    (written, errors)
}

/// Submits update-rows payloads in chunks of `chunk_size`, sequentially,
/// with the same failure accumulation as [`submit_adds`].
pub async fn submit_updates<D: SheetApi>(
    dest: &D,
    sheet_id: i64,
    rows: &[RowUpdate],
    chunk_size: usize,
) -> (usize, Vec<WriteError>) {
    let mut written = 0;
    let mut errors = Vec::new();
    for (chunk_index, chunk) in chunks(rows, chunk_size).enumerate() {
        match dest.update_rows(sheet_id, chunk).await {
            Ok(count) => written += count,
            Err(e) => {
                tracing::error!(
                    sheet_id,
                    chunk_index,
                    rows = chunk.len(),
                    error = %e,
                    "update-rows chunk failed"
                );
                errors.push(WriteError {
                    sheet_id,
                    chunk_index,
                    rows: chunk.len(),
                    message: e.to_string(),
                });
            }
        }
    }
    (written, errors)
}
