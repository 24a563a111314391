use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of configuration object migrated between instances
///
/// Every kind carries, as data, the field names used by the Zabbix API for its
/// identifier and display name, the API resource that addresses it, and where
/// it lives in backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Template,
    HostGroup,
    Host,
    MediaType,
    Service,
    Proxy,
}

/// How a kind's stored payload is submitted to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPath {
    /// Through `configuration.import`; the value is the export option name
    Bulk(&'static str),
    /// Object by object through `<resource>.create` / `<resource>.update`
    PerObject,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Template,
        ObjectKind::HostGroup,
        ObjectKind::Host,
        ObjectKind::MediaType,
        ObjectKind::Service,
        ObjectKind::Proxy,
    ];

    /// Kinds whose snapshot section must be present in every persisted snapshot
    pub const REQUIRED_IN_SNAPSHOT: [ObjectKind; 4] = [
        ObjectKind::Template,
        ObjectKind::HostGroup,
        ObjectKind::Host,
        ObjectKind::MediaType,
    ];

    pub fn id_field(self) -> &'static str {
        match self {
            ObjectKind::Template => "templateid",
            ObjectKind::HostGroup => "groupid",
            ObjectKind::Host => "hostid",
            ObjectKind::MediaType => "mediatypeid",
            ObjectKind::Service => "serviceid",
            ObjectKind::Proxy => "proxyid",
        }
    }

    pub fn name_field(self) -> &'static str {
        match self {
            ObjectKind::Template | ObjectKind::Host | ObjectKind::Proxy => "host",
            ObjectKind::HostGroup | ObjectKind::MediaType | ObjectKind::Service => "name",
        }
    }

    /// API resource prefix, e.g. `hostgroup` in `hostgroup.get`
    pub fn resource(self) -> &'static str {
        match self {
            ObjectKind::Template => "template",
            ObjectKind::HostGroup => "hostgroup",
            ObjectKind::Host => "host",
            ObjectKind::MediaType => "mediatype",
            ObjectKind::Service => "service",
            ObjectKind::Proxy => "proxy",
        }
    }

    /// Top-level key of this kind in the persisted snapshot
    pub fn snapshot_key(self) -> &'static str {
        match self {
            ObjectKind::Template => "templates",
            ObjectKind::HostGroup => "hostgroups",
            ObjectKind::Host => "hosts",
            ObjectKind::MediaType => "mediatypes",
            ObjectKind::Service => "services",
            ObjectKind::Proxy => "proxies",
        }
    }

    /// Name of the backup file holding this kind's full payload
    pub fn backup_file(self) -> String {
        format!("{}.json", self.snapshot_key())
    }

    pub fn import_path(self) -> ImportPath {
        match self {
            ObjectKind::Template => ImportPath::Bulk("templates"),
            ObjectKind::HostGroup => ImportPath::Bulk("groups"),
            ObjectKind::Host => ImportPath::Bulk("hosts"),
            ObjectKind::MediaType => ImportPath::Bulk("mediaTypes"),
            ObjectKind::Service | ObjectKind::Proxy => ImportPath::PerObject,
        }
    }

    /// Kinds that must be imported successfully before this one makes sense
    pub fn depends_on(self) -> &'static [ObjectKind] {
        match self {
            ObjectKind::Template => &[ObjectKind::HostGroup],
            ObjectKind::Host => &[ObjectKind::HostGroup, ObjectKind::Template],
            ObjectKind::Service => &[ObjectKind::Host],
            ObjectKind::HostGroup | ObjectKind::MediaType | ObjectKind::Proxy => &[],
        }
    }

    /// Keys the platform assigns or rejects on create, removed before resubmission
    pub fn strip_keys(self) -> &'static [&'static str] {
        match self {
            ObjectKind::Proxy => &["proxyid", "lastaccess", "auto_compress"],
            _ => &[],
        }
    }

    /// Plural label used in log lines
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Template => "templates",
            ObjectKind::HostGroup => "host groups",
            ObjectKind::Host => "hosts",
            ObjectKind::MediaType => "media types",
            ObjectKind::Service => "services",
            ObjectKind::Proxy => "proxies",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Template => "template",
            ObjectKind::HostGroup => "host-group",
            ObjectKind::Host => "host",
            ObjectKind::MediaType => "media-type",
            ObjectKind::Service => "service",
            ObjectKind::Proxy => "proxy",
        };
        f.write_str(s)
    }
}

/// Class of automation rule backed up verbatim and recreated after import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionClass {
    Trigger,
    Registration,
}

impl ActionClass {
    pub const ALL: [ActionClass; 2] = [ActionClass::Trigger, ActionClass::Registration];

    /// Zabbix `eventsource` filter value
    pub fn event_source(self) -> u8 {
        match self {
            ActionClass::Trigger => 0,
            ActionClass::Registration => 2,
        }
    }

    pub fn backup_file(self) -> &'static str {
        match self {
            ActionClass::Trigger => "trigger_actions.json",
            ActionClass::Registration => "reg_actions.json",
        }
    }

    /// Keys removed on top of the common action strip list
    pub fn extra_strip_keys(self) -> &'static [&'static str] {
        match self {
            ActionClass::Trigger => &[],
            ActionClass::Registration => &["pause_suppressed", "esc_period"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionClass::Trigger => "trigger actions",
            ActionClass::Registration => "auto-registration actions",
        }
    }
}
