//! Set reconciliation: route fetched keys into add/update/mark-deleted
//! buckets against one or more destination sheets.

use std::collections::{BTreeMap, BTreeSet};

use tradesync_core::RecordKey;

/// The keys currently present on one sheet, with their row ids.
#[derive(Debug, Clone)]
pub struct SheetKeys {
    pub sheet_id: i64,
    pub identities: BTreeMap<RecordKey, i64>,
}

/// Keys assigned to one sheet by the partition, with their row ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetAssignment {
    pub sheet_id: i64,
    pub rows: BTreeMap<RecordKey, i64>,
}

/// Disjoint three-way partition of fetched vs. existing keys.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Fetched keys present on no sheet.
    pub to_add: BTreeSet<RecordKey>,
    /// Fetched keys present on a sheet, one assignment per sheet. When a key
    /// exists on several sheets it routes to the earliest-listed one.
    pub to_update: Vec<SheetAssignment>,
    /// Keys present on a sheet but absent from the fetch, pending validation.
    pub deletion_candidates: Vec<SheetAssignment>,
}

/// Partitions `fetched` against the per-sheet key sets.
///
/// `existing` is ordered by precedence: the active sheet first, archived
/// after. Every fetched key lands in exactly one bucket, and every existing
/// key not fetched becomes a deletion candidate on its own sheet.
#[must_use]
pub fn partition(fetched: &BTreeSet<RecordKey>, existing: &[SheetKeys]) -> Partition {
    let mut to_add = fetched.clone();
    let mut to_update = Vec::with_capacity(existing.len());
    let mut deletion_candidates = Vec::with_capacity(existing.len());
    let mut claimed: BTreeSet<RecordKey> = BTreeSet::new();

    for sheet in existing {
        let mut updates = BTreeMap::new();
        let mut candidates = BTreeMap::new();
        for (key, row_id) in &sheet.identities {
            if fetched.contains(key) {
                to_add.remove(key);
                // Earlier sheets take precedence for duplicate keys.
                if claimed.insert(key.clone()) {
                    updates.insert(key.clone(), *row_id);
                }
            } else {
                candidates.insert(key.clone(), *row_id);
            }
        }
        to_update.push(SheetAssignment {
            sheet_id: sheet.sheet_id,
            rows: updates,
        });
        deletion_candidates.push(SheetAssignment {
            sheet_id: sheet.sheet_id,
            rows: candidates,
        });
    }

    Partition {
        to_add,
        to_update,
        deletion_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ids: &[i64]) -> BTreeSet<RecordKey> {
        ids.iter().map(|id| RecordKey::from(*id)).collect()
    }

    fn sheet(sheet_id: i64, entries: &[(i64, i64)]) -> SheetKeys {
        SheetKeys {
            sheet_id,
            identities: entries
                .iter()
                .map(|(key, row)| (RecordKey::from(*key), *row))
                .collect(),
        }
    }

    fn key_set(assignment: &SheetAssignment) -> BTreeSet<RecordKey> {
        assignment.rows.keys().cloned().collect()
    }

    #[test]
    fn classic_scenario() {
        // existing {1,2,3}, fetched {2,3,4} => add {4}, update {2,3}, candidates {1}
        let fetched = keys(&[2, 3, 4]);
        let existing = vec![sheet(10, &[(1, 501), (2, 502), (3, 503)])];
        let p = partition(&fetched, &existing);

        assert_eq!(p.to_add, keys(&[4]));
        assert_eq!(key_set(&p.to_update[0]), keys(&[2, 3]));
        assert_eq!(key_set(&p.deletion_candidates[0]), keys(&[1]));
        assert_eq!(p.deletion_candidates[0].rows[&RecordKey::from(1)], 501);
    }

    #[test]
    fn covers_fetched_and_existing_exactly_once() {
        let fetched = keys(&[2, 3, 4]);
        let existing = vec![sheet(10, &[(1, 501), (2, 502), (3, 503)])];
        let p = partition(&fetched, &existing);

        let mut seen: BTreeSet<RecordKey> = BTreeSet::new();
        for key in &p.to_add {
            assert!(seen.insert(key.clone()), "{key} appears twice");
        }
        for assignment in p.to_update.iter().chain(&p.deletion_candidates) {
            for key in assignment.rows.keys() {
                assert!(seen.insert(key.clone()), "{key} appears twice");
            }
        }
        let mut union = fetched.clone();
        union.extend(existing[0].identities.keys().cloned());
        assert_eq!(seen, union);
    }

    #[test]
    fn duplicate_key_routes_to_active_sheet_only() {
        let fetched = keys(&[5]);
        let existing = vec![sheet(10, &[(5, 501)]), sheet(20, &[(5, 901)])];
        let p = partition(&fetched, &existing);

        assert!(p.to_add.is_empty());
        assert_eq!(key_set(&p.to_update[0]), keys(&[5]));
        assert!(
            p.to_update[1].rows.is_empty(),
            "archived sheet must not receive the update"
        );
        assert!(p.deletion_candidates.iter().all(|a| a.rows.is_empty()));
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let fetched = keys(&[1, 2]);
        let first = partition(&fetched, &[sheet(10, &[])]);
        assert_eq!(first.to_add, keys(&[1, 2]));

        // Pretend the adds landed: keys now exist on the sheet.
        let after = vec![sheet(10, &[(1, 601), (2, 602)])];
        let second = partition(&fetched, &after);
        assert!(second.to_add.is_empty());
        assert!(second.deletion_candidates.iter().all(|a| a.rows.is_empty()));
        assert_eq!(key_set(&second.to_update[0]), keys(&[1, 2]));
    }

    #[test]
    fn tolerates_empty_inputs() {
        let p = partition(&BTreeSet::new(), &[]);
        assert!(p.to_add.is_empty());
        assert!(p.to_update.is_empty());

        let p = partition(&keys(&[1]), &[]);
        assert_eq!(p.to_add, keys(&[1]));

        let p = partition(&BTreeSet::new(), &[sheet(10, &[(9, 700)])]);
        assert_eq!(key_set(&p.deletion_candidates[0]), keys(&[9]));
    }
}
