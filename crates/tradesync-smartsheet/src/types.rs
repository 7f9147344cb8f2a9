//! Typed shapes for the Smartsheet REST payloads.
//!
//! Read types deserialize the sheet/row/cell structure; write types serialize
//! the add-rows and update-rows request bodies. Column resolution goes
//! through [`ColumnIndex`], built once per sheet fetch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SmartsheetError;

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Row {
    pub id: i64,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl Row {
    /// Value of the cell in the given column, if the row has one and it is
    /// non-null.
    #[must_use]
    pub fn cell_value(&self, column_id: i64) -> Option<&Value> {
        self.cells
            .iter()
            .find(|c| c.column_id == column_id)
            .map(|c| &c.value)
            .filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    #[serde(rename = "columnId")]
    pub column_id: i64,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "displayValue", default)]
    pub display_value: Option<String>,
}

/// One cell in a write payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CellWrite {
    #[serde(rename = "columnId")]
    pub column_id: i64,
    pub value: Value,
}

/// Row payload for add-rows; appended at the bottom of the sheet.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewRow {
    #[serde(rename = "toBottom")]
    pub to_bottom: bool,
    pub cells: Vec<CellWrite>,
}

impl NewRow {
    #[must_use]
    pub fn at_bottom(cells: Vec<CellWrite>) -> Self {
        Self {
            to_bottom: true,
            cells,
        }
    }
}

/// Row payload for update-rows; targets an existing row id.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowUpdate {
    pub id: i64,
    pub cells: Vec<CellWrite>,
}

/// Acknowledgement envelope for write calls.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Vec<Row>,
}

/// Column-title → column-id map for one sheet, built once per fetch so row
/// conversion avoids a linear column scan per cell.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    sheet_id: i64,
    by_title: HashMap<String, i64>,
}

impl ColumnIndex {
    #[must_use]
    pub fn new(sheet_id: i64, columns: &[Column]) -> Self {
        let by_title = columns
            .iter()
            .map(|c| (c.title.clone(), c.id))
            .collect();
        Self { sheet_id, by_title }
    }

    #[must_use]
    pub fn from_sheet(sheet: &Sheet) -> Self {
        Self::new(sheet.id, &sheet.columns)
    }

    #[must_use]
    pub fn get(&self, title: &str) -> Option<i64> {
        self.by_title.get(title).copied()
    }

    /// Resolves a column the operation cannot proceed without.
    ///
    /// # Errors
    ///
    /// Returns [`SmartsheetError::MissingColumn`] when the title is absent.
    pub fn require(&self, title: &str) -> Result<i64, SmartsheetError> {
        self.get(title).ok_or_else(|| SmartsheetError::MissingColumn {
            sheet_id: self.sheet_id,
            title: title.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column {
                id: 11,
                title: "ScheduleID".to_owned(),
            },
            Column {
                id: 12,
                title: "ScheduleComment".to_owned(),
            },
        ]
    }

    #[test]
    fn column_index_resolves_by_title() {
        let index = ColumnIndex::new(99, &columns());
        assert_eq!(index.get("ScheduleID"), Some(11));
        assert_eq!(index.get("Nope"), None);
    }

    #[test]
    fn require_reports_sheet_and_title() {
        let index = ColumnIndex::new(99, &columns());
        let err = index.require("ISDeleted").unwrap_err();
        assert!(matches!(
            err,
            SmartsheetError::MissingColumn { sheet_id: 99, ref title } if title == "ISDeleted"
        ));
    }

    #[test]
    fn cell_value_skips_null_cells() {
        let row: Row = serde_json::from_value(json!({
            "id": 5,
            "cells": [
                { "columnId": 11, "value": 42.0 },
                { "columnId": 12, "value": null }
            ]
        }))
        .unwrap();
        assert_eq!(row.cell_value(11), Some(&json!(42.0)));
        assert_eq!(row.cell_value(12), None);
        assert_eq!(row.cell_value(13), None);
    }

    #[test]
    fn new_row_serializes_to_bottom() {
        let row = NewRow::at_bottom(vec![CellWrite {
            column_id: 11,
            value: json!(7),
        }]);
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["toBottom"], json!(true));
        assert_eq!(v["cells"][0]["columnId"], json!(11));
    }
}
