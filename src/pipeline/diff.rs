// src/pipeline/diff.rs

//! Changeset computation between a fresh harvest and a stored baseline.
//!
//! Rows are keyed by canonical identity and compared by content fingerprint,
//! so formatting-only differences (field order, line endings, edge
//! whitespace, unknown columns) never produce a modification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Record;

/// A record present in the harvest but not the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedChange {
    pub identity: String,
    pub after: Record,
}

/// A record present in the baseline but absent from the harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedChange {
    pub identity: String,
    pub before: Record,
}

/// A record whose content fingerprint changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedChange {
    pub identity: String,
    pub before: Record,
    pub after: Record,
}

/// The three disjoint partitions of a diff, each sorted by identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<AddedChange>,
    pub removed: Vec<RemovedChange>,
    pub modified: Vec<ModifiedChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "+{} -{} ~{}",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }
}

/// Diff harvested rows against a baseline keyed by canonical identity.
///
/// Duplicate identities among the harvested rows collapse last-write-wins
/// before comparison. Rows with no canonical identity are ignored.
pub fn compute_diff(rows: &[Record], baseline: &HashMap<String, Record>) -> ChangeSet {
    let mut current: HashMap<String, &Record> = HashMap::with_capacity(rows.len());
    for record in rows {
        let identity = record.identity();
        if identity.is_empty() {
            continue;
        }
        current.insert(identity, record);
    }

    let mut changes = ChangeSet::default();
    for (identity, after) in &current {
        match baseline.get(identity) {
            None => changes.added.push(AddedChange {
                identity: identity.clone(),
                after: (*after).clone(),
            }),
            Some(before) => {
                if before.fingerprint() != after.fingerprint() {
                    changes.modified.push(ModifiedChange {
                        identity: identity.clone(),
                        before: before.clone(),
                        after: (*after).clone(),
                    });
                }
            }
        }
    }
    for (identity, before) in baseline {
        if !current.contains_key(identity) {
            changes.removed.push(RemovedChange {
                identity: identity.clone(),
                before: before.clone(),
            });
        }
    }

    changes.added.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes.removed.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes.modified.sort_by(|a, b| a.identity.cmp(&b.identity));
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IDENTITY_FIELD;

    fn record(number: &str, status: &str) -> Record {
        Record::from_pairs([(IDENTITY_FIELD, number), ("Status", status)])
    }

    fn baseline(rows: &[Record]) -> HashMap<String, Record> {
        rows.iter()
            .map(|r| (r.identity(), r.clone()))
            .collect()
    }

    #[test]
    fn test_added_removed_modified_partitions() {
        let before = baseline(&[record("001", "MARKETED"), record("002", "MARKETED")]);
        let after = vec![record("002", "DISCONTINUED"), record("003", "MARKETED")];

        let changes = compute_diff(&after, &before);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].identity, "003");
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].identity, "001");
        assert_eq!(changes.modified.len(), 1);
        assert_eq!(changes.modified[0].identity, "002");
        assert_eq!(changes.modified[0].before.get("Status"), "MARKETED");
        assert_eq!(changes.modified[0].after.get("Status"), "DISCONTINUED");
        assert_eq!(changes.summary(), "+1 -1 ~1");
    }

    #[test]
    fn test_identical_content_yields_empty_changeset() {
        let rows = vec![record("001", "MARKETED")];
        let changes = compute_diff(&rows, &baseline(&rows));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_formatting_differences_are_not_modifications() {
        let mut stored = record("001", "MARKETED");
        stored.set("Ingredient", "acid a\r\nacid b");
        let mut fetched = record("00 1", "MARKETED");
        fetched.set("Ingredient", "  acid a\nacid b ");
        fetched.set("Unlisted Column", "noise");

        let changes = compute_diff(&[fetched], &baseline(&[stored]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_duplicate_identities_last_write_wins() {
        let rows = vec![record("001", "MARKETED"), record("001", "DISCONTINUED")];
        let changes = compute_diff(&rows, &baseline(&[record("001", "MARKETED")]));
        assert_eq!(changes.modified.len(), 1);
        assert_eq!(changes.modified[0].after.get("Status"), "DISCONTINUED");
    }

    #[test]
    fn test_rows_without_identity_ignored() {
        let rows = vec![record("", "MARKETED")];
        let changes = compute_diff(&rows, &HashMap::new());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_output_sorted_by_identity() {
        let after = vec![record("009", "M"), record("003", "M"), record("005", "M")];
        let changes = compute_diff(&after, &HashMap::new());
        let ids: Vec<_> = changes.added.iter().map(|a| a.identity.as_str()).collect();
        assert_eq!(ids, vec!["003", "005", "009"]);
    }
}
