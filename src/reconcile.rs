use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::kind::ObjectKind;
use crate::snapshot::ObjectRecord;

/// Why destination objects are scheduled for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionReason {
    /// Same id on both sides but the content differs
    Drift,
    /// Caller asked to discard every existing object of the kind
    Forced,
}

/// Destination objects of one kind to delete before importing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    pub kind: ObjectKind,
    pub ids: BTreeSet<String>,
    pub reason: DeletionReason,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

/// Destination ids whose content drifted from the origin record with the same id
///
/// Objects present on only one side are left alone; the platform's import
/// rules create what is missing.
pub fn diff(kind: ObjectKind, origin: &[ObjectRecord], dest: &[ObjectRecord]) -> BTreeSet<String> {
    let dest_by_id: HashMap<&str, &ObjectRecord> =
        dest.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut drifted = BTreeSet::new();
    for record in origin {
        if let Some(current) = dest_by_id.get(record.id.as_str()) {
            if current.fingerprint != record.fingerprint {
                log::debug!(
                    "{kind} {} (\"{}\") drifted: {} != {}",
                    record.id,
                    current.name,
                    record.fingerprint,
                    current.fingerprint
                );
                drifted.insert(record.id.clone());
            }
        }
    }
    drifted
}

/// Every destination id of the kind
pub fn force_delete_all(_kind: ObjectKind, dest: &[ObjectRecord]) -> BTreeSet<String> {
    dest.iter().map(|r| r.id.clone()).collect()
}

/// Decide which destination objects to remove before importing `kind`
pub fn plan(
    kind: ObjectKind,
    origin: &[ObjectRecord],
    dest: &[ObjectRecord],
    force: bool,
) -> DeletionPlan {
    if force {
        DeletionPlan {
            kind,
            ids: force_delete_all(kind, dest),
            reason: DeletionReason::Forced,
        }
    } else {
        DeletionPlan {
            kind,
            ids: diff(kind, origin, dest),
            reason: DeletionReason::Drift,
        }
    }
}
