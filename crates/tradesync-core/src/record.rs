//! Canonical business keys and the source-record projection consumed by the
//! reconciliation engine.
//!
//! Simpro and Smartsheet disagree on how a key looks: Simpro returns integer
//! IDs, Smartsheet hands the same value back as a float cell (`42.0`) or a
//! text cell (`"42"`). [`RecordKey`] collapses all three into one canonical
//! text form so set operations line up.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comment written to rows whose business key is confirmed absent from
/// Simpro. Soft delete only; the row itself is never removed.
pub const DELETION_MARKER: &str = "Deleted from Simpro";

/// Canonical form of a business-key value.
///
/// Integral numbers render without a fractional part, strings are trimmed,
/// composite keys join their parts with `/`. Ordered and hashable so it can
/// drive `BTreeSet`/`HashMap` based set reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    /// Canonicalizes a destination cell value into a key.
    ///
    /// Returns `None` for null, empty, or non-scalar cells; those rows are
    /// treated as not carrying a key at all.
    #[must_use]
    pub fn from_cell(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                // Smartsheet stores numeric cells as f64; 42 comes back as 42.0.
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else {
                    n.as_f64().map(|f| {
                        if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                            #[allow(clippy::cast_possible_truncation)]
                            Self((f as i64).to_string())
                        } else {
                            Self(f.to_string())
                        }
                    })
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_owned()))
                }
            }
            _ => None,
        }
    }

    /// Joins composite identifier parts (job / section / cost center) into a
    /// single canonical key.
    #[must_use]
    pub fn composite(parts: &[i64]) -> Self {
        let joined = parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// One source record projected to the shape the engine understands: a key
/// plus the attribute cells destined for the sheet, keyed by column title.
///
/// Per-entity conversion (schedule, quotation, lead, cost-center line) happens
/// at the Simpro client boundary; the engine never sees entity-specific types.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub key: RecordKey,
    pub attributes: Vec<(String, Value)>,
}

impl SourceRow {
    #[must_use]
    pub fn new(key: RecordKey, attributes: Vec<(String, Value)>) -> Self {
        Self { key, attributes }
    }
}

/// The logical entity kinds the engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Schedules,
    Quotes,
    Leads,
    CostCenters,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Schedules => "schedules",
            EntityKind::Quotes => "quotes",
            EntityKind::Leads => "leads",
            EntityKind::CostCenters => "cost-centers",
        }
    }

    /// Column title holding the business key on this entity's sheets.
    #[must_use]
    pub fn key_column(self) -> &'static str {
        match self {
            EntityKind::Schedules => "ScheduleID",
            EntityKind::Quotes => "QuoteID",
            EntityKind::Leads => "LeadID",
            EntityKind::CostCenters => "SIMPROKey",
        }
    }

    /// Column title receiving the deletion marker comment.
    #[must_use]
    pub fn comment_column(self) -> &'static str {
        match self {
            EntityKind::Schedules => "ScheduleComment",
            EntityKind::Quotes => "QuoteComment",
            EntityKind::Leads => "LeadComment",
            EntityKind::CostCenters => "SIMPROComment",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schedules" => Ok(EntityKind::Schedules),
            "quotes" => Ok(EntityKind::Quotes),
            "leads" => Ok(EntityKind::Leads),
            "cost-centers" => Ok(EntityKind::CostCenters),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
