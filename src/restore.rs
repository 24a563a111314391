//! Restore of a backup directory onto a destination instance
//!
//! A restore is a strictly ordered sequence of stages. Later stages depend on
//! identifiers produced by earlier ones: actions can only be rewritten once
//! templates and host groups exist on the destination. Nothing is rolled back
//! when a stage fails.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::{capture_kind, capture_snapshot};
use crate::client::ZabbixApi;
use crate::error::{MigrateError, Result};
use crate::fingerprint::scalar_field;
use crate::kind::{ActionClass, ImportPath, ObjectKind};
use crate::logger::append_log;
use crate::reconcile::{self, DeletionReason};
use crate::report::{ActionFailure, KindOutcome, RestoreReport};
use crate::rewrite::{strip_keys, Rewriter, UnresolvedReference};
use crate::rules::import_rules_json;
use crate::snapshot::{Snapshot, SNAPSHOT_FILE};

/// Action id the platform reserves for its internal housekeeping action
pub const INTERNAL_ACTION_ID: &str = "3";

/// Order in which object kinds are imported
pub const IMPORT_ORDER: [ObjectKind; 6] = [
    ObjectKind::HostGroup,
    ObjectKind::MediaType,
    ObjectKind::Template,
    ObjectKind::Host,
    ObjectKind::Service,
    ObjectKind::Proxy,
];

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Delete every destination template before importing templates
    pub force_template: bool,

    /// File that receives one line per stage outcome
    pub journal: Option<PathBuf>,
}

/// Stage of a restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchDestSnapshot,
    Import(ObjectKind),
    RewriteActions,
    ImportActions,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::FetchDestSnapshot => Stage::Import(IMPORT_ORDER[0]),
            Stage::Import(kind) => {
                match IMPORT_ORDER.iter().position(|k| *k == kind) {
                    Some(pos) if pos + 1 < IMPORT_ORDER.len() => {
                        Stage::Import(IMPORT_ORDER[pos + 1])
                    }
                    _ => Stage::RewriteActions,
                }
            }
            Stage::RewriteActions => Stage::ImportActions,
            Stage::ImportActions | Stage::Done => Stage::Done,
        }
    }
}

/// An action ready for submission
#[derive(Debug, Clone)]
pub struct PreparedAction {
    pub class: ActionClass,
    pub payload: Value,
    pub unresolved: Vec<UnresolvedReference>,
}

impl PreparedAction {
    fn name(&self) -> String {
        self.payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string()
    }
}

/// Read a JSON array written by a backup; `null` stands for an empty export
pub fn read_object_list(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        MigrateError::InvalidPayload(format!("{} is not valid JSON: {e}", path.display()))
    })?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(MigrateError::InvalidPayload(format!(
            "{} does not hold a list",
            path.display()
        ))),
    }
}

/// Id of the object whose name field equals `name`, looked up on the destination
fn find_id_by_name(
    api: &dyn ZabbixApi,
    resource: &str,
    id_field: &str,
    name_field: &str,
    name: &str,
) -> Result<Option<String>> {
    let found = api.get(
        resource,
        json!({"output": [id_field, name_field], "filter": {name_field: name}}),
    )?;
    Ok(found.first().and_then(|object| scalar_field(object, id_field)))
}

/// Drives one restore run against a destination instance
pub struct Restorer<'a> {
    api: &'a dyn ZabbixApi,
    data_dir: PathBuf,
    options: RestoreOptions,
}

impl<'a> Restorer<'a> {
    pub fn new(
        api: &'a dyn ZabbixApi,
        data_dir: impl Into<PathBuf>,
        options: RestoreOptions,
    ) -> Self {
        Restorer {
            api,
            data_dir: data_dir.into(),
            options,
        }
    }

    /// Run every stage in order and return what happened
    ///
    /// A corrupt origin snapshot, transport failures, a refused session and
    /// non-conflict errors on a kind's first attempt abort the run. A kind
    /// that fails its forced retry is recorded in the report and only stops
    /// the kinds that depend on it; a refused action is recorded and the
    /// remaining actions are still submitted.
    pub fn run(&self) -> Result<RestoreReport> {
        let origin = Snapshot::load(&self.data_dir.join(SNAPSHOT_FILE))?;
        let mut report = RestoreReport::new(self.options.force_template);
        self.journal(&format!(
            "restore {} from {}",
            report.run_id,
            self.data_dir.display()
        ));

        let mut dest = Snapshot::new();
        let mut actions = Vec::new();
        let mut stage = Stage::FetchDestSnapshot;

        while stage != Stage::Done {
            match stage {
                Stage::FetchDestSnapshot => {
                    log::info!("Getting current ids from the destination");
                    dest = capture_snapshot(self.api, &ObjectKind::ALL)?;
                    self.journal(&format!("destination holds {} objects", dest.total_records()));
                }
                Stage::Import(kind) => {
                    log::info!("Importing {}", kind.label());
                    let outcome = self.import_kind(kind, &origin, &dest, &mut report)?;
                    self.journal(&format!("{kind}: {outcome:?}"));
                    report.record_outcome(kind, outcome);
                }
                Stage::RewriteActions => {
                    actions = self.rewrite_actions(&origin, &mut report)?;
                    self.journal(&format!(
                        "rewrote {} actions, {} unresolved references",
                        actions.len(),
                        report.unresolved.len()
                    ));
                }
                Stage::ImportActions => {
                    if let Some(reason) = &report.actions_skipped {
                        self.journal(&format!("actions skipped: {reason}"));
                    } else {
                        log::info!("Importing actions");
                        self.import_actions(actions.drain(..), &mut report)?;
                        self.journal(&format!(
                            "actions: {} created, {} updated, {} failed",
                            report.actions.created,
                            report.actions.updated,
                            report.actions.failed.len()
                        ));
                    }
                }
                Stage::Done => {}
            }
            stage = stage.next();
        }

        Ok(report)
    }

    // Journal lines are best effort; a missing log never stops a restore
    fn journal(&self, message: &str) {
        if let Some(path) = &self.options.journal {
            if let Err(e) = append_log(path, message) {
                log::warn!("Could not write restore journal: {e:#}");
            }
        }
    }

    fn import_kind(
        &self,
        kind: ObjectKind,
        origin: &Snapshot,
        dest: &Snapshot,
        report: &mut RestoreReport,
    ) -> Result<KindOutcome> {
        let blocked_by = kind
            .depends_on()
            .iter()
            .find(|dep| report.outcome(**dep).is_some_and(|o| !o.unblocks_dependants()));
        if let Some(dep) = blocked_by {
            log::warn!("Skipping {}: {} did not import", kind.label(), dep.label());
            return Ok(KindOutcome::Skipped(format!("{} did not import", dep.label())));
        }

        let path = self.data_dir.join(kind.backup_file());
        if !path.exists() {
            log::warn!("No backup of {} at {}", kind.label(), path.display());
            return Ok(KindOutcome::Absent);
        }

        let force = self.options.force_template && kind == ObjectKind::Template;
        let plan = reconcile::plan(kind, origin.records(kind), dest.records(kind), force);
        if !plan.is_empty() {
            log::info!("Deleting {} {} ({:?})", plan.ids.len(), kind.label(), plan.reason);
            self.api.delete(kind.resource(), &plan.ids())?;
            report.record_deletion(kind, plan.reason, plan.ids());
        }

        match self.submit(kind, &path) {
            Ok(()) => Ok(KindOutcome::Imported),
            Err(e) if e.is_conflict() => {
                log::warn!("Import of {} conflicted ({e}); replacing all of them", kind.label());
                match self.retry_after_forced_delete(kind, &path, report) {
                    Ok(()) => Ok(KindOutcome::Retried),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        log::error!("Import of {} failed again: {e}", kind.label());
                        Ok(KindOutcome::Failed(e.to_string()))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    fn retry_after_forced_delete(
        &self,
        kind: ObjectKind,
        path: &Path,
        report: &mut RestoreReport,
    ) -> Result<()> {
        let current = capture_kind(self.api, kind)?;
        let ids: Vec<String> = reconcile::force_delete_all(kind, &current)
            .into_iter()
            .collect();
        if !ids.is_empty() {
            self.api.delete(kind.resource(), &ids)?;
            report.record_deletion(kind, DeletionReason::Forced, ids);
        }
        self.submit(kind, path)
    }

    fn submit(&self, kind: ObjectKind, path: &Path) -> Result<()> {
        match kind.import_path() {
            ImportPath::Bulk(_) => {
                let source = fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
                self.api.import_configuration(&source, &import_rules_json())
            }
            ImportPath::PerObject => {
                for object in read_object_list(path)? {
                    self.submit_object(kind, object)?;
                }
                Ok(())
            }
        }
    }

    // Create, or update the destination object of the same name when it
    // already exists.
    fn submit_object(&self, kind: ObjectKind, mut object: Value) -> Result<()> {
        strip_keys(&mut object, kind.strip_keys());
        if let Some(map) = object.as_object_mut() {
            map.remove(kind.id_field());
        }

        match self.api.create(kind.resource(), &object) {
            Ok(id) => {
                log::debug!("Created {kind} {id}");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                let Some(name) = scalar_field(&object, kind.name_field()) else {
                    return Err(e);
                };
                let existing = find_id_by_name(
                    self.api,
                    kind.resource(),
                    kind.id_field(),
                    kind.name_field(),
                    &name,
                )?;
                let Some(id) = existing else {
                    return Err(e);
                };
                object[kind.id_field()] = Value::String(id.clone());
                self.api.update(kind.resource(), &object)?;
                log::debug!("Updated {kind} {id} (\"{name}\")");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Load the stored actions and translate their references for the destination
    fn rewrite_actions(
        &self,
        origin: &Snapshot,
        report: &mut RestoreReport,
    ) -> Result<Vec<PreparedAction>> {
        for dep in [ObjectKind::HostGroup, ObjectKind::Template] {
            if report.outcome(dep).is_some_and(|o| !o.unblocks_dependants()) {
                log::warn!("Skipping actions: {} did not import", dep.label());
                report.actions_skipped = Some(format!("{} did not import", dep.label()));
                return Ok(Vec::new());
            }
        }

        // Post-import state, so templates and groups carry destination ids
        let dest = capture_snapshot(self.api, &[ObjectKind::Template, ObjectKind::HostGroup])?;

        let mut prepared = Vec::new();
        for class in [ActionClass::Trigger, ActionClass::Registration] {
            let path = self.data_dir.join(class.backup_file());
            if !path.exists() {
                log::warn!("No backup of {} at {}", class.label(), path.display());
                continue;
            }

            let rewriter = Rewriter::for_class(origin, &dest, class);
            for action in read_object_list(&path)? {
                let rewritten = rewriter.rewrite(action);
                if !rewritten.is_clean() {
                    for reference in &rewritten.unresolved {
                        log::warn!("Unresolved reference: {}", reference.description());
                    }
                    report.unresolved.extend(rewritten.unresolved.iter().cloned());
                }
                prepared.push(PreparedAction {
                    class,
                    payload: rewritten.payload,
                    unresolved: rewritten.unresolved,
                });
            }
        }

        Ok(prepared)
    }

    fn import_actions<I>(&self, actions: I, report: &mut RestoreReport) -> Result<()>
    where
        I: IntoIterator<Item = PreparedAction>,
    {
        match self.api.delete("action", &[INTERNAL_ACTION_ID.to_string()]) {
            Ok(()) => log::info!("Deleted internal action {INTERNAL_ACTION_ID}"),
            Err(e) if e.is_not_found() => {
                log::warn!("Internal action {INTERNAL_ACTION_ID} not present: {e}")
            }
            Err(e) => return Err(e),
        }

        for mut action in actions {
            let name = action.name();
            match self.create_or_update_action(&mut action) {
                Ok(true) => report.actions.created += 1,
                Ok(false) => report.actions.updated += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!("Could not import {} \"{name}\": {e}", action.class.label());
                    let suspects = action
                        .unresolved
                        .iter()
                        .map(|reference| MigrateError::from(reference).to_string())
                        .collect();
                    report.actions.failed.push(ActionFailure {
                        name,
                        class: action.class,
                        error: e.to_string(),
                        suspects,
                    });
                }
            }
        }

        Ok(())
    }

    // Ok(true) when created, Ok(false) when an existing action was updated
    fn create_or_update_action(&self, action: &mut PreparedAction) -> Result<bool> {
        match self.api.create("action", &action.payload) {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => {
                let name = action.name();
                let existing = find_id_by_name(self.api, "action", "actionid", "name", &name)?;
                let Some(id) = existing else {
                    return Err(e);
                };
                if let Some(map) = action.payload.as_object_mut() {
                    // eventsource cannot be changed on update
                    map.remove("eventsource");
                    map.insert("actionid".to_string(), Value::String(id));
                }
                self.api.update("action", &action.payload)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Restore `data_dir` onto the instance behind `api`
pub fn restore(
    api: &dyn ZabbixApi,
    data_dir: &Path,
    options: RestoreOptions,
) -> Result<RestoreReport> {
    Restorer::new(api, data_dir, options).run()
}
