use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{MigrateError, Result};
use crate::fingerprint::scalar_field;
use crate::kind::ObjectKind;

/// File name of the persisted origin snapshot inside a data directory
pub const SNAPSHOT_FILE: &str = "id_map_backup.json";

/// Identity and content fingerprint of one remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub kind: ObjectKind,
    pub id: String,
    pub name: String,
    pub fingerprint: String,
}

impl ObjectRecord {
    pub fn new(
        kind: ObjectKind,
        id: impl Into<String>,
        name: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        ObjectRecord {
            kind,
            id: id.into(),
            name: name.into(),
            fingerprint: fingerprint.into(),
        }
    }

    // Persisted shape uses the kind's own field names, e.g.
    // {"templateid": "10108", "host": "web-tier", "hash": "..."}
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.kind.id_field().to_string(), Value::String(self.id.clone()));
        map.insert(
            self.kind.name_field().to_string(),
            Value::String(self.name.clone()),
        );
        map.insert("hash".to_string(), Value::String(self.fingerprint.clone()));
        Value::Object(map)
    }

    fn from_value(kind: ObjectKind, value: &Value) -> std::result::Result<Self, String> {
        if !value.is_object() {
            return Err(format!("{} entry is not an object", kind.snapshot_key()));
        }
        let id = scalar_field(value, kind.id_field())
            .ok_or_else(|| format!("{} entry without {}", kind.snapshot_key(), kind.id_field()))?;
        let name = scalar_field(value, kind.name_field()).ok_or_else(|| {
            format!(
                "{} entry {id} without {}",
                kind.snapshot_key(),
                kind.name_field()
            )
        })?;
        let fingerprint = value
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("{} entry {id} without hash", kind.snapshot_key()))?
            .to_string();

        Ok(ObjectRecord {
            kind,
            id,
            name,
            fingerprint,
        })
    }
}

/// Records of every object kind captured from one instance
///
/// The origin snapshot is written once per backup and never modified; the
/// destination snapshot is captured fresh for every restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub templates: Vec<ObjectRecord>,
    pub hostgroups: Vec<ObjectRecord>,
    pub hosts: Vec<ObjectRecord>,
    pub mediatypes: Vec<ObjectRecord>,
    pub services: Vec<ObjectRecord>,
    pub proxies: Vec<ObjectRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, kind: ObjectKind) -> &[ObjectRecord] {
        match kind {
            ObjectKind::Template => &self.templates,
            ObjectKind::HostGroup => &self.hostgroups,
            ObjectKind::Host => &self.hosts,
            ObjectKind::MediaType => &self.mediatypes,
            ObjectKind::Service => &self.services,
            ObjectKind::Proxy => &self.proxies,
        }
    }

    fn records_mut(&mut self, kind: ObjectKind) -> &mut Vec<ObjectRecord> {
        match kind {
            ObjectKind::Template => &mut self.templates,
            ObjectKind::HostGroup => &mut self.hostgroups,
            ObjectKind::Host => &mut self.hosts,
            ObjectKind::MediaType => &mut self.mediatypes,
            ObjectKind::Service => &mut self.services,
            ObjectKind::Proxy => &mut self.proxies,
        }
    }

    /// Merge records into the section for `kind`
    ///
    /// A record whose id is already present replaces the existing one in
    /// place; new ids are appended in the order given.
    pub fn capture<I>(&mut self, kind: ObjectKind, records: I)
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        let section = self.records_mut(kind);
        for mut record in records {
            record.kind = kind;
            match section.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => section.push(record),
            }
        }
    }

    /// Replace the section for `kind` wholesale
    pub fn replace(&mut self, kind: ObjectKind, records: Vec<ObjectRecord>) {
        *self.records_mut(kind) = records;
    }

    pub fn find_by_id(&self, kind: ObjectKind, id: &str) -> Option<&ObjectRecord> {
        self.records(kind).iter().find(|r| r.id == id)
    }

    /// First record carrying `name`; names are not unique, so a collision
    /// silently resolves to the earliest captured record
    pub fn find_by_name(&self, kind: ObjectKind, name: &str) -> Option<&ObjectRecord> {
        self.records(kind).iter().find(|r| r.name == name)
    }

    /// Names that appear more than once within a kind
    pub fn duplicate_names(&self, kind: ObjectKind) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for record in self.records(kind) {
            if !seen.insert(record.name.as_str()) && !dupes.contains(&record.name.as_str()) {
                dupes.push(record.name.as_str());
            }
        }
        dupes
    }

    pub fn total_records(&self) -> usize {
        ObjectKind::ALL.iter().map(|k| self.records(*k).len()).sum()
    }

    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        for kind in ObjectKind::ALL {
            let entries = self.records(kind).iter().map(ObjectRecord::to_value).collect();
            doc.insert(kind.snapshot_key().to_string(), Value::Array(entries));
        }
        Value::Object(doc)
    }

    /// Write the snapshot as one JSON document, overwriting `path`
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| MigrateError::io(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| MigrateError::InvalidPayload(e.to_string()))?;

        fs::write(path, content).map_err(|e| MigrateError::io(path, e))?;
        log::debug!(
            "Persisted snapshot with {} records to {}",
            self.total_records(),
            path.display()
        );

        Ok(())
    }

    /// Read a snapshot persisted by [`Snapshot::persist`]
    ///
    /// Fails with `CorruptSnapshot` when the file is not JSON, when a required
    /// section is missing, or when an entry lacks one of its fields. The
    /// `services` and `proxies` sections are optional.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| MigrateError::corrupt(path, format!("invalid JSON: {e}")))?;

        Self::from_json(&doc).map_err(|reason| MigrateError::corrupt(path, reason))
    }

    pub fn from_json(doc: &Value) -> std::result::Result<Self, String> {
        let doc = doc
            .as_object()
            .ok_or_else(|| "top level is not an object".to_string())?;

        let mut snapshot = Snapshot::new();
        for kind in ObjectKind::ALL {
            let required = ObjectKind::REQUIRED_IN_SNAPSHOT.contains(&kind);
            let entries = match doc.get(kind.snapshot_key()) {
                Some(Value::Array(entries)) => entries,
                // An empty kind used to be written as null by older exports
                Some(Value::Null) => continue,
                Some(_) => return Err(format!("\"{}\" is not an array", kind.snapshot_key())),
                None if required => {
                    return Err(format!("missing key \"{}\"", kind.snapshot_key()))
                }
                None => continue,
            };

            let records = entries
                .iter()
                .map(|entry| ObjectRecord::from_value(kind, entry))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            snapshot.replace(kind, records);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.capture(
            ObjectKind::Template,
            vec![ObjectRecord::new(ObjectKind::Template, "10108", "web-tier", "h1")],
        );
        snapshot.capture(
            ObjectKind::HostGroup,
            vec![
                ObjectRecord::new(ObjectKind::HostGroup, "8", "legacy", "h2"),
                ObjectRecord::new(ObjectKind::HostGroup, "10", "linux", "h3"),
            ],
        );
        snapshot
    }

    #[test]
    fn test_persisted_format_uses_kind_fields() {
        let doc = sample().to_json();
        assert_eq!(
            doc["templates"][0],
            json!({"templateid": "10108", "host": "web-tier", "hash": "h1"})
        );
        assert_eq!(
            doc["hostgroups"][1],
            json!({"groupid": "10", "name": "linux", "hash": "h3"})
        );
        assert_eq!(doc["hosts"], json!([]));
        assert_eq!(doc["mediatypes"], json!([]));
    }

    #[test]
    fn test_persist_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(SNAPSHOT_FILE);

        let snapshot = sample();
        snapshot.persist(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_persist_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SNAPSHOT_FILE);

        sample().persist(&path).unwrap();
        Snapshot::new().persist(&path).unwrap();

        assert_eq!(Snapshot::load(&path).unwrap().total_records(), 0);
    }

    #[test]
    fn test_capture_replaces_same_id() {
        let mut snapshot = sample();
        snapshot.capture(
            ObjectKind::HostGroup,
            vec![
                ObjectRecord::new(ObjectKind::HostGroup, "8", "legacy-renamed", "h9"),
                ObjectRecord::new(ObjectKind::HostGroup, "12", "windows", "h4"),
            ],
        );

        let groups = snapshot.records(ObjectKind::HostGroup);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name, "legacy-renamed");
        assert_eq!(groups[2].id, "12");
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SNAPSHOT_FILE);
        fs::write(&path, "{not json").unwrap();

        let err = Snapshot::load(&path).unwrap_err();
        assert!(matches!(err, MigrateError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_load_rejects_missing_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SNAPSHOT_FILE);
        fs::write(&path, r#"{"templates": [], "hostgroups": [], "hosts": []}"#).unwrap();

        match Snapshot::load(&path).unwrap_err() {
            MigrateError::CorruptSnapshot { reason, .. } => assert!(reason.contains("mediatypes")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_accepts_missing_optional_sections() {
        let doc = json!({
            "templates": [{"templateid": "1", "host": "t", "hash": "x"}],
            "hostgroups": [],
            "hosts": [],
            "mediatypes": []
        });
        let snapshot = Snapshot::from_json(&doc).unwrap();
        assert_eq!(snapshot.templates.len(), 1);
        assert!(snapshot.services.is_empty());
        assert!(snapshot.proxies.is_empty());
    }

    #[test]
    fn test_load_rejects_entry_without_hash() {
        let doc = json!({
            "templates": [{"templateid": "1", "host": "t"}],
            "hostgroups": [],
            "hosts": [],
            "mediatypes": []
        });
        assert!(Snapshot::from_json(&doc).unwrap_err().contains("hash"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = Snapshot::load(&temp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Io { .. }));
    }

    #[test]
    fn test_find_by_name_takes_first_match() {
        let mut snapshot = Snapshot::new();
        snapshot.capture(
            ObjectKind::Template,
            vec![
                ObjectRecord::new(ObjectKind::Template, "1", "dup", "a"),
                ObjectRecord::new(ObjectKind::Template, "2", "dup", "b"),
            ],
        );

        assert_eq!(snapshot.find_by_name(ObjectKind::Template, "dup").unwrap().id, "1");
        assert_eq!(snapshot.duplicate_names(ObjectKind::Template), vec!["dup"]);
    }
}
