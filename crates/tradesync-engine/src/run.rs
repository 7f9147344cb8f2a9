//! One full reconciliation pass for a single entity: fetch, partition,
//! validate deletions, then write adds, updates, and soft-delete markers.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use tradesync_core::chunk::{COMMENT_CHUNK_SIZE, WRITE_CHUNK_SIZE};
use tradesync_core::{RecordKey, SheetPair, SheetTarget, SourceRow};
use tradesync_smartsheet::ColumnIndex;

use crate::error::EngineError;
use crate::identity::extract_identities;
use crate::partition::{partition, SheetKeys};
use crate::traits::{EntitySource, SheetApi};
use crate::validate::{collect_verdicts, KeyError};
use crate::writer::{
    deletion_marker_updates, submit_adds, submit_updates, to_new_rows, to_row_updates, SkippedRow,
    WriteError,
};

/// A destination sheet the run could not use at all, e.g. it failed to load
/// or its key column is missing. The run continues on the other sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetError {
    pub sheet_id: i64,
    pub message: String,
}

/// Outcome of one entity run. Partial failure is the normal shape here:
/// counts reflect what landed, the error lists say what did not and why.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub entity: String,
    pub fetched: usize,
    pub added: usize,
    pub updated: usize,
    pub marked_deleted: usize,
    pub skipped: Vec<SkippedRow>,
    pub validation_errors: Vec<KeyError>,
    pub write_errors: Vec<WriteError>,
    pub sheet_errors: Vec<SheetError>,
}

struct LoadedSheet {
    target: SheetTarget,
    index: ColumnIndex,
    identities: BTreeMap<RecordKey, i64>,
}

async fn load_sheet<D: SheetApi>(
    dest: &D,
    target: &SheetTarget,
) -> Result<LoadedSheet, String> {
    let sheet = dest
        .get_sheet(target.sheet_id)
        .await
        .map_err(|e| e.to_string())?;
    let index = ColumnIndex::from_sheet(&sheet);
    let key_column_id = index
        .require(&target.key_column)
        .map_err(|e| e.to_string())?;
    let identities = extract_identities(&sheet.rows, key_column_id);
    Ok(LoadedSheet {
        target: target.clone(),
        index,
        identities,
    })
}

/// Runs one reconciliation pass of `source` against the entity's sheets.
///
/// A failing `list_current` aborts the run; everything downstream degrades
/// per sheet, per key, or per chunk instead. Adds go to the active sheet
/// only, updates and deletion markers go to whichever sheet holds the row.
pub async fn run_sync<S, D>(
    source: &S,
    dest: &D,
    sheets: &SheetPair,
) -> Result<RunSummary, EngineError>
where
    S: EntitySource,
    D: SheetApi,
{
    let entity = source.entity();
    let records = source.list_current().await.map_err(EngineError::Source)?;

    let mut by_key: BTreeMap<RecordKey, SourceRow> = BTreeMap::new();
    for record in records {
        by_key.insert(record.key.clone(), record);
    }
    let fetched: BTreeSet<RecordKey> = by_key.keys().cloned().collect();

    let mut summary = RunSummary {
        entity: entity.to_string(),
        fetched: fetched.len(),
        ..RunSummary::default()
    };

    let mut loaded = Vec::new();
    for target in sheets.targets() {
        match load_sheet(dest, target).await {
            Ok(sheet) => loaded.push(sheet),
            Err(message) => {
                tracing::warn!(
                    entity = %entity,
                    sheet_id = target.sheet_id,
                    %message,
                    "skipping unusable sheet"
                );
                summary.sheet_errors.push(SheetError {
                    sheet_id: target.sheet_id,
                    message,
                });
            }
        }
    }

    let existing: Vec<SheetKeys> = loaded
        .iter()
        .map(|sheet| SheetKeys {
            sheet_id: sheet.target.sheet_id,
            identities: sheet.identities.clone(),
        })
        .collect();
    let parts = partition(&fetched, &existing);

    // Adds land on the active sheet only. If that sheet was unusable this
    // run, the records stay pending for the next one.
    if let Some(active) = loaded
        .iter()
        .find(|s| s.target.sheet_id == sheets.active.sheet_id)
    {
        let add_records: Vec<SourceRow> = parts
            .to_add
            .iter()
            .filter_map(|key| by_key.get(key).cloned())
            .collect();
        let (rows, skipped) = to_new_rows(&add_records, &active.index);
        summary.skipped.extend(skipped);
        let (written, errors) =
            submit_adds(dest, active.target.sheet_id, &rows, WRITE_CHUNK_SIZE).await;
        summary.added += written;
        summary.write_errors.extend(errors);
    } else if !parts.to_add.is_empty() {
        tracing::warn!(
            entity = %entity,
            pending = parts.to_add.len(),
            "active sheet unavailable, deferring adds"
        );
    }

    // Deletion candidates are re-queried before anything is marked. A key
    // held by both sheets is probed once; its verdict fans back to every
    // sheet that holds it.
    let all_candidates: BTreeSet<RecordKey> = parts
        .deletion_candidates
        .iter()
        .flat_map(|sheet| sheet.rows.keys().cloned())
        .collect();

    let mut confirmed_absent: BTreeSet<RecordKey> = BTreeSet::new();
    let mut refreshed_by_key: BTreeMap<RecordKey, SourceRow> = BTreeMap::new();
    if !all_candidates.is_empty() {
        let keys: Vec<RecordKey> = all_candidates.iter().cloned().collect();
        let verdicts = collect_verdicts(source.probe(&keys).await);
        summary.validation_errors.extend(verdicts.errors);
        confirmed_absent = verdicts.confirmed_absent;

        // A key the source still knows rejoins the update set of each sheet
        // holding it.
        if !verdicts.confirmed_existing.is_empty() {
            let rejoin: Vec<RecordKey> = verdicts.confirmed_existing.iter().cloned().collect();
            match source.fetch_by_keys(&rejoin).await {
                Ok(refreshed) => {
                    for record in refreshed {
                        refreshed_by_key.insert(record.key.clone(), record);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    summary
                        .validation_errors
                        .extend(rejoin.into_iter().map(|key| KeyError {
                            key,
                            message: message.clone(),
                        }));
                }
            }
        }
    }

    for (position, sheet) in loaded.iter().enumerate() {
        let mut update_rows_map = parts.to_update[position].rows.clone();
        let mut update_records: Vec<SourceRow> = update_rows_map
            .keys()
            .filter_map(|key| by_key.get(key).cloned())
            .collect();

        let candidates = &parts.deletion_candidates[position].rows;
        for (key, row_id) in candidates {
            if let Some(record) = refreshed_by_key.get(key) {
                update_rows_map.insert(key.clone(), *row_id);
                update_records.push(record.clone());
            }
        }

        let marked: BTreeMap<RecordKey, i64> = candidates
            .iter()
            .filter(|(key, _)| confirmed_absent.contains(*key))
            .map(|(key, row_id)| (key.clone(), *row_id))
            .collect();
        if !marked.is_empty() {
            match sheet.index.require(&sheet.target.comment_column) {
                Ok(comment_column_id) => {
                    let markers = deletion_marker_updates(&marked, comment_column_id);
                    let (written, errors) = submit_updates(
                        dest,
                        sheet.target.sheet_id,
                        &markers,
                        COMMENT_CHUNK_SIZE,
                    )
                    .await;
                    summary.marked_deleted += written;
                    summary.write_errors.extend(errors);
                }
                Err(e) => summary.sheet_errors.push(SheetError {
                    sheet_id: sheet.target.sheet_id,
                    message: e.to_string(),
                }),
            }
        }

        let (rows, skipped) = to_row_updates(&update_records, &update_rows_map, &sheet.index);
        summary.skipped.extend(skipped);
        let (written, errors) =
            submit_updates(dest, sheet.target.sheet_id, &rows, WRITE_CHUNK_SIZE).await;
        summary.updated += written;
        summary.write_errors.extend(errors);
    }

    tracing::info!(
        entity = %entity,
        fetched = summary.fetched,
        added = summary.added,
        updated = summary.updated,
        marked_deleted = summary.marked_deleted,
        skipped = summary.skipped.len(),
        validation_errors = summary.validation_errors.len(),
        write_errors = summary.write_errors.len(),
        "sync run complete"
    );
    Ok(summary)
}
