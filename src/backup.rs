//! Export of an instance's configuration into a data directory
//!
//! A backup directory holds one configuration-export document per bulk kind,
//! raw object lists for services and proxies, raw action lists, and the origin
//! snapshot `id_map_backup.json` that restores join against.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::ZabbixApi;
use crate::error::{MigrateError, Result};
use crate::fingerprint;
use crate::kind::{ActionClass, ImportPath, ObjectKind};
use crate::snapshot::{ObjectRecord, Snapshot, SNAPSHOT_FILE};

/// Files written by one backup run
#[derive(Debug, Default)]
pub struct BackupSummary {
    pub files: Vec<PathBuf>,
    pub objects: Vec<(ObjectKind, usize)>,
    pub actions: Vec<(ActionClass, usize)>,
    pub snapshot_records: usize,
}

/// Fetch every object of `kind` with all fields
pub fn fetch_all(api: &dyn ZabbixApi, kind: ObjectKind) -> Result<Vec<Value>> {
    api.get(kind.resource(), json!({"output": "extend"}))
}

/// Fingerprint every object of `kind` currently on the instance
pub fn capture_kind(api: &dyn ZabbixApi, kind: ObjectKind) -> Result<Vec<ObjectRecord>> {
    fetch_all(api, kind)?
        .iter()
        .map(|object| fingerprint::record(kind, object))
        .collect()
}

/// Capture a snapshot of the given kinds
pub fn capture_snapshot(api: &dyn ZabbixApi, kinds: &[ObjectKind]) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for kind in kinds {
        let records = capture_kind(api, *kind)?;
        log::debug!("Captured {} {}", records.len(), kind.label());
        snapshot.capture(*kind, records);
        for name in snapshot.duplicate_names(*kind) {
            log::warn!(
                "Several {} share the name \"{name}\"; references will join on the first one",
                kind.label()
            );
        }
    }
    Ok(snapshot)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| MigrateError::io(path, e))
}

fn export_kind(api: &dyn ZabbixApi, kind: ObjectKind, data_dir: &Path) -> Result<(PathBuf, usize)> {
    let path = data_dir.join(kind.backup_file());

    let count = match kind.import_path() {
        ImportPath::Bulk(option) => {
            let ids: Vec<String> = api
                .get(kind.resource(), json!({"output": kind.id_field()}))?
                .iter()
                .filter_map(|object| fingerprint::scalar_field(object, kind.id_field()))
                .collect();
            if ids.is_empty() {
                log::info!("No {} found", kind.label());
            }
            let mut options = Map::new();
            options.insert(option.to_string(), json!(ids));
            let document = api.export_configuration(Value::Object(options))?;
            write_file(&path, &document)?;
            ids.len()
        }
        ImportPath::PerObject => {
            let objects = fetch_all(api, kind)?;
            if objects.is_empty() {
                log::info!("No {} found", kind.label());
            }
            let content = serde_json::to_string(&objects)
                .map_err(|e| MigrateError::InvalidPayload(e.to_string()))?;
            write_file(&path, &content)?;
            objects.len()
        }
    };

    Ok((path, count))
}

/// Fetch actions of one class with operations, recovery operations and filter
pub fn fetch_actions(api: &dyn ZabbixApi, class: ActionClass) -> Result<Vec<Value>> {
    api.get(
        "action",
        json!({
            "output": "extend",
            "selectOperations": "extend",
            "selectRecoveryOperations": "extend",
            "selectFilter": "extend",
            "filter": {"eventsource": class.event_source()},
        }),
    )
}

fn export_actions(
    api: &dyn ZabbixApi,
    class: ActionClass,
    data_dir: &Path,
) -> Result<(PathBuf, usize)> {
    let actions = fetch_actions(api, class)?;
    if actions.is_empty() {
        log::info!("No {} found", class.label());
    }

    let path = data_dir.join(class.backup_file());
    let content =
        serde_json::to_string(&actions).map_err(|e| MigrateError::InvalidPayload(e.to_string()))?;
    write_file(&path, &content)?;

    Ok((path, actions.len()))
}

/// Capture the snapshot of every kind and persist it in `data_dir`
pub fn write_id_map(api: &dyn ZabbixApi, data_dir: &Path) -> Result<(PathBuf, Snapshot)> {
    fs::create_dir_all(data_dir).map_err(|e| MigrateError::io(data_dir, e))?;

    let snapshot = capture_snapshot(api, &ObjectKind::ALL)?;
    let path = data_dir.join(SNAPSHOT_FILE);
    snapshot.persist(&path)?;

    Ok((path, snapshot))
}

/// Back up the whole configuration into `data_dir`
pub fn backup(api: &dyn ZabbixApi, data_dir: &Path) -> Result<BackupSummary> {
    fs::create_dir_all(data_dir).map_err(|e| MigrateError::io(data_dir, e))?;
    let mut summary = BackupSummary::default();

    for kind in ObjectKind::ALL {
        log::info!("Exporting {}", kind.label());
        let (path, count) = export_kind(api, kind, data_dir)?;
        summary.files.push(path);
        summary.objects.push((kind, count));
    }

    for class in [ActionClass::Registration, ActionClass::Trigger] {
        log::info!("Exporting {}", class.label());
        let (path, count) = export_actions(api, class, data_dir)?;
        summary.files.push(path);
        summary.actions.push((class, count));
    }

    log::info!("Writing id map");
    let (path, snapshot) = write_id_map(api, data_dir)?;
    summary.files.push(path);
    summary.snapshot_records = snapshot.total_records();

    Ok(summary)
}
