//! Per-entity destination sheet configuration.
//!
//! Every logical entity syncs to one active sheet and optionally an archived
//! ("move past") sheet holding rows that were shifted out of the active view.
//! Both sheets carry the same key and comment columns.

use crate::app_config::SheetIds;
use crate::record::EntityKind;

/// One destination sheet plus the column titles the engine needs on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub sheet_id: i64,
    pub key_column: String,
    pub comment_column: String,
}

impl SheetTarget {
    #[must_use]
    pub fn for_entity(kind: EntityKind, sheet_id: i64) -> Self {
        Self {
            sheet_id,
            key_column: kind.key_column().to_owned(),
            comment_column: kind.comment_column().to_owned(),
        }
    }
}

/// Active sheet plus optional archived sheet for one entity.
///
/// Order matters: the active sheet is listed first and wins precedence when a
/// key appears on both sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPair {
    pub active: SheetTarget,
    pub archived: Option<SheetTarget>,
}

impl SheetPair {
    #[must_use]
    pub fn single(active: SheetTarget) -> Self {
        Self {
            active,
            archived: None,
        }
    }

    #[must_use]
    pub fn with_archive(active: SheetTarget, archived: SheetTarget) -> Self {
        Self {
            active,
            archived: Some(archived),
        }
    }

    /// Targets in precedence order: active first, then archived if present.
    pub fn targets(&self) -> impl Iterator<Item = &SheetTarget> {
        std::iter::once(&self.active).chain(self.archived.as_ref())
    }

    /// Resolves an entity's configured pair from the sheet id settings.
    /// `None` means the entity has no active sheet and cannot sync.
    #[must_use]
    pub fn from_ids(kind: EntityKind, sheets: &SheetIds) -> Option<Self> {
        let (active, archived) = match kind {
            EntityKind::Schedules => (sheets.schedules_active, sheets.schedules_archived),
            EntityKind::Quotes => (sheets.quotes, None),
            EntityKind::Leads => (sheets.leads, None),
            EntityKind::CostCenters => (sheets.cost_centers_active, sheets.cost_centers_archived),
        };
        let active = SheetTarget::for_entity(kind, active?);
        Some(match archived {
            Some(id) => Self::with_archive(active, SheetTarget::for_entity(kind, id)),
            None => Self::single(active),
        })
    }
}
