//! Identity extraction: which business keys already live on a sheet, and in
//! which rows.

use std::collections::BTreeMap;

use tradesync_core::RecordKey;
use tradesync_smartsheet::types::Row;

/// Maps each business key present on the sheet to its row id.
///
/// Rows whose key cell is null, missing, or non-scalar are silently excluded;
/// they represent partially provisioned rows, not errors. When the same key
/// appears twice the first row wins, matching the destination's "at most one
/// active row per key" invariant.
#[must_use]
pub fn extract_identities(rows: &[Row], key_column_id: i64) -> BTreeMap<RecordKey, i64> {
    let mut identities = BTreeMap::new();
    for row in rows {
        let Some(value) = row.cell_value(key_column_id) else {
            continue;
        };
        let Some(key) = RecordKey::from_cell(value) else {
            continue;
        };
        identities.entry(key).or_insert(row.id);
    }
    identities
}
