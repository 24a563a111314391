use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::kind::{ActionClass, ObjectKind};
use crate::reconcile::DeletionReason;
use crate::rewrite::UnresolvedReference;

/// File name of the report written next to the backup after a restore
pub const REPORT_FILE: &str = "restore-report.json";

/// How the import of one object kind ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum KindOutcome {
    /// Submitted on the first attempt
    Imported,
    /// Submitted after forcing deletion of every destination object
    Retried,
    /// Failed twice; kinds depending on it were skipped
    Failed(String),
    Skipped(String),
    /// No backup file for the kind
    Absent,
}

impl KindOutcome {
    /// Whether dependants of this kind may still be imported
    pub fn unblocks_dependants(&self) -> bool {
        matches!(
            self,
            KindOutcome::Imported | KindOutcome::Retried | KindOutcome::Absent
        )
    }
}

/// Ids removed from the destination for one kind
#[derive(Debug, Clone, Serialize)]
pub struct Deletion {
    pub reason: DeletionReason,
    pub ids: Vec<String>,
}

/// An action the destination refused
#[derive(Debug, Clone, Serialize)]
pub struct ActionFailure {
    pub name: String,
    pub class: ActionClass,
    pub error: String,

    /// Unresolved references carried by the payload, the usual cause
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suspects: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionTally {
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<ActionFailure>,
}

/// Summary of one restore run
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub run_id: String,

    /// RFC 3339 start time
    pub started_at: String,

    pub force_template: bool,

    /// Outcome per kind, in import order
    pub kinds: Vec<(ObjectKind, KindOutcome)>,

    pub deletions: BTreeMap<ObjectKind, Vec<Deletion>>,

    pub actions: ActionTally,

    /// Set when actions were not imported at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_skipped: Option<String>,

    /// References left untouched; these actions need manual review
    pub unresolved: Vec<UnresolvedReference>,
}

impl RestoreReport {
    pub fn new(force_template: bool) -> Self {
        RestoreReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            force_template,
            kinds: Vec::new(),
            deletions: BTreeMap::new(),
            actions: ActionTally::default(),
            actions_skipped: None,
            unresolved: Vec::new(),
        }
    }

    pub fn outcome(&self, kind: ObjectKind) -> Option<&KindOutcome> {
        self.kinds.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }

    pub fn record_outcome(&mut self, kind: ObjectKind, outcome: KindOutcome) {
        self.kinds.push((kind, outcome));
    }

    pub fn record_deletion(&mut self, kind: ObjectKind, reason: DeletionReason, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        self.deletions
            .entry(kind)
            .or_default()
            .push(Deletion { reason, ids });
    }

    pub fn failed_kinds(&self) -> Vec<ObjectKind> {
        self.kinds
            .iter()
            .filter(|(_, o)| matches!(o, KindOutcome::Failed(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    /// True when every kind and action went through without failure
    pub fn is_clean(&self) -> bool {
        self.kinds
            .iter()
            .all(|(_, o)| !matches!(o, KindOutcome::Failed(_) | KindOutcome::Skipped(_)))
            && self.actions.failed.is_empty()
            && self.actions_skipped.is_none()
            && self.unresolved.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize restore report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write restore report: {}", path.display()))?;
        Ok(())
    }

    /// Print a colored summary to the console
    pub fn print_summary(&self) {
        println!("\n{}", "Restore summary".bold());

        for (kind, outcome) in &self.kinds {
            let status = match outcome {
                KindOutcome::Imported => "imported".green(),
                KindOutcome::Retried => "imported after forced delete".yellow(),
                KindOutcome::Failed(reason) => format!("FAILED: {reason}").red(),
                KindOutcome::Skipped(reason) => format!("skipped: {reason}").yellow(),
                KindOutcome::Absent => "no backup file".dimmed(),
            };
            println!("  {:<12} {}", kind.label().cyan(), status);

            if let Some(deletions) = self.deletions.get(kind) {
                for deletion in deletions {
                    let reason = match deletion.reason {
                        DeletionReason::Drift => "drifted",
                        DeletionReason::Forced => "forced",
                    };
                    println!("  {:<12} deleted {} {reason}", "", deletion.ids.len());
                }
            }
        }

        match &self.actions_skipped {
            Some(reason) => println!(
                "  {:<12} {}",
                "actions".cyan(),
                format!("skipped: {reason}").yellow()
            ),
            None => {
                println!(
                    "  {:<12} {} created, {} updated",
                    "actions".cyan(),
                    self.actions.created,
                    self.actions.updated
                );
                for failure in &self.actions.failed {
                    let line = format!("failed: {}: {}", failure.name, failure.error);
                    println!("  {:<12} {}", "", line.red());
                    for suspect in &failure.suspects {
                        println!("  {:<12}   {suspect}", "");
                    }
                }
            }
        }

        if !self.unresolved.is_empty() {
            println!(
                "\n{}",
                format!(
                    "{} reference(s) could not be remapped; review these actions manually:",
                    self.unresolved.len()
                )
                .yellow()
                .bold()
            );
            for reference in &self.unresolved {
                println!("  - {}", reference.description());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outcome_gating() {
        assert!(KindOutcome::Absent.unblocks_dependants());
        assert!(KindOutcome::Retried.unblocks_dependants());
        assert!(!KindOutcome::Failed("x".into()).unblocks_dependants());
        assert!(!KindOutcome::Skipped("x".into()).unblocks_dependants());
    }

    #[test]
    fn test_empty_deletions_are_not_recorded() {
        let mut report = RestoreReport::new(false);
        report.record_deletion(ObjectKind::Host, DeletionReason::Drift, Vec::new());
        assert!(report.deletions.is_empty());
    }

    #[test]
    fn test_report_serializes() {
        let temp = TempDir::new().unwrap();
        let mut report = RestoreReport::new(true);
        report.record_outcome(ObjectKind::Template, KindOutcome::Retried);
        report.record_outcome(ObjectKind::Host, KindOutcome::Failed("conflict".into()));
        report.record_deletion(ObjectKind::Template, DeletionReason::Forced, vec!["1".into()]);

        let path = temp.path().join(REPORT_FILE);
        report.save(&path).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["kinds"][0][0], "template");
        assert_eq!(saved["kinds"][0][1]["status"], "retried");
        assert_eq!(saved["kinds"][1][1]["detail"], "conflict");
        assert_eq!(saved["deletions"]["template"][0]["reason"], "forced");
        assert!(!report.is_clean());
        assert_eq!(report.failed_kinds(), vec![ObjectKind::Host]);
    }
}
