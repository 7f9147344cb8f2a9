//! In-memory fakes backing the engine's unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::json;

use tradesync_core::{EntityKind, RecordKey, SourceRow};
use tradesync_simpro::SimproError;
use tradesync_smartsheet::types::{NewRow, RowUpdate, Sheet};
use tradesync_smartsheet::SmartsheetError;

use crate::traits::{EntitySource, SheetApi};
use crate::validate::{ProbeError, ProbeOutcome};

/// Builds a `Sheet` value from titles and `(row_id, key_value)` pairs, with
/// the key column at id 11 and a comment column at id 12.
pub(crate) fn sheet_fixture(
    sheet_id: i64,
    key_title: &str,
    comment_title: &str,
    rows: &[(i64, serde_json::Value)],
) -> Sheet {
    let rows_json: Vec<serde_json::Value> = rows
        .iter()
        .map(|(row_id, key)| {
            json!({
                "id": row_id,
                "cells": [ { "columnId": 11, "value": key } ]
            })
        })
        .collect();
    serde_json::from_value(json!({
        "id": sheet_id,
        "name": format!("sheet-{sheet_id}"),
        "columns": [
            { "id": 11, "title": key_title },
            { "id": 12, "title": comment_title },
            { "id": 13, "title": "StaffName" }
        ],
        "rows": rows_json
    }))
    .expect("fixture sheet should deserialize")
}

#[derive(Default)]
pub(crate) struct FakeSheets {
    sheets: Mutex<HashMap<i64, Sheet>>,
    pub added: Mutex<Vec<(i64, Vec<NewRow>)>>,
    pub updated: Mutex<Vec<(i64, Vec<RowUpdate>)>>,
    fail_add_calls: Mutex<HashSet<usize>>,
    add_calls: AtomicUsize,
}

impl FakeSheets {
    pub fn with_sheet(self, sheet: Sheet) -> Self {
        self.sheets
            .lock()
            .expect("lock poisoned")
            .insert(sheet.id, sheet);
        self
    }

    /// Makes the nth `add_rows` call (0-based) fail with a 500.
    pub fn fail_add_chunk(&self, call: usize) {
        self.fail_add_calls
            .lock()
            .expect("lock poisoned")
            .insert(call);
    }

    pub fn added_rows(&self, sheet_id: i64) -> Vec<NewRow> {
        self.added
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(id, _)| *id == sheet_id)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    pub fn updated_rows(&self, sheet_id: i64) -> Vec<RowUpdate> {
        self.updated
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(id, _)| *id == sheet_id)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }
}

impl SheetApi for FakeSheets {
    async fn get_sheet(&self, sheet_id: i64) -> Result<Sheet, SmartsheetError> {
        self.sheets
            .lock()
            .expect("lock poisoned")
            .get(&sheet_id)
            .cloned()
            .ok_or(SmartsheetError::Api {
                status: 404,
                message: format!("no fixture sheet {sheet_id}"),
            })
    }

    async fn add_rows(&self, sheet_id: i64, rows: &[NewRow]) -> Result<usize, SmartsheetError> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_add_calls
            .lock()
            .expect("lock poisoned")
            .contains(&call)
        {
            return Err(SmartsheetError::Api {
                status: 500,
                message: "injected chunk failure".to_owned(),
            });
        }
        self.added
            .lock()
            .expect("lock poisoned")
            .push((sheet_id, rows.to_vec()));
        Ok(rows.len())
    }

    async fn update_rows(
        &self,
        sheet_id: i64,
        rows: &[RowUpdate],
    ) -> Result<usize, SmartsheetError> {
        self.updated
            .lock()
            .expect("lock poisoned")
            .push((sheet_id, rows.to_vec()));
        Ok(rows.len())
    }
}

/// Entity source fake: `list_current` returns `current`; `probe` answers
/// Exists for keys in `extant`, errors for keys in `flaky`, Absent otherwise.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub current: Vec<SourceRow>,
    pub extant: HashSet<RecordKey>,
    pub flaky: HashSet<RecordKey>,
    pub all_records: BTreeMap<RecordKey, SourceRow>,
    /// Every key batch passed to `probe`, in call order.
    pub probe_calls: Mutex<Vec<Vec<RecordKey>>>,
}

impl FakeSource {
    pub fn schedule_row(id: i64, staff: &str) -> SourceRow {
        SourceRow::new(
            RecordKey::from(id),
            vec![
                ("ScheduleID".to_owned(), json!(id)),
                ("StaffName".to_owned(), json!(staff)),
            ],
        )
    }
}

impl EntitySource for FakeSource {
    fn entity(&self) -> EntityKind {
        EntityKind::Schedules
    }

    async fn list_current(&self) -> Result<Vec<SourceRow>, SimproError> {
        Ok(self.current.clone())
    }

    async fn fetch_by_keys(&self, keys: &[RecordKey]) -> Result<Vec<SourceRow>, SimproError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.all_records.get(k).cloned())
            .collect())
    }

    async fn probe(
        &self,
        keys: &[RecordKey],
    ) -> Vec<(RecordKey, Result<ProbeOutcome, ProbeError>)> {
        self.probe_calls
            .lock()
            .expect("lock poisoned")
            .push(keys.to_vec());
        keys.iter()
            .map(|key| {
                let result = if self.flaky.contains(key) {
                    Err(ProbeError {
                        message: "injected probe failure".to_owned(),
                        not_found: false,
                    })
                } else if self.extant.contains(key) {
                    Ok(ProbeOutcome::Exists)
                } else {
                    Ok(ProbeOutcome::Absent)
                };
                (key.clone(), result)
            })
            .collect()
    }
}
