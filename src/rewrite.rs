//! Identifier rewriting for action payloads
//!
//! Actions exported from one instance reference templates and host groups by
//! the identifiers of that instance. Before an action can be created on the
//! destination, every `templateid` and `groupid` is translated through two
//! snapshots: the origin snapshot gives the display name of the old id, the
//! destination snapshot gives the id now carrying that name. Server-assigned
//! keys are stripped along the way.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::MigrateError;
use crate::kind::{ActionClass, ObjectKind};
use crate::snapshot::Snapshot;

/// Alias for the tree shape actions are stored and submitted in
pub type ActionPayload = Value;

/// Keys assigned by the destination or rejected on create
pub const ACTION_STRIP_KEYS: [&str; 4] =
    ["actionid", "maintenance_mode", "eval_formula", "operationid"];

/// A reference that could not be translated and was left as exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    /// Field holding the reference, `templateid` or `groupid`
    pub field: String,
    pub kind: ObjectKind,
    /// Identifier as found in the payload
    pub id: String,
    /// Origin display name, when the origin snapshot knew the id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the action the reference belongs to, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl UnresolvedReference {
    pub fn description(&self) -> String {
        let action = self.action.as_deref().unwrap_or("<unnamed action>");
        match &self.name {
            Some(name) => format!(
                "{action}: {} {} (\"{name}\") has no {} named \"{name}\" on the destination",
                self.field, self.id, self.kind
            ),
            None => format!(
                "{action}: {} {} is not in the origin snapshot",
                self.field, self.id
            ),
        }
    }
}

impl From<&UnresolvedReference> for MigrateError {
    fn from(reference: &UnresolvedReference) -> Self {
        MigrateError::ReferenceUnresolved {
            field: reference.field.clone(),
            kind: reference.kind,
            id: reference.id.clone(),
        }
    }
}

/// Result of rewriting one action
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub payload: ActionPayload,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Rewritten {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Rewrites references in action payloads for one restore
///
/// Built once from the origin and destination snapshots, then applied to every
/// action of the run.
pub struct Rewriter<'a> {
    origin: &'a Snapshot,
    dest: &'a Snapshot,
    strip: Vec<&'static str>,
}

impl<'a> Rewriter<'a> {
    pub fn new(origin: &'a Snapshot, dest: &'a Snapshot) -> Self {
        Rewriter {
            origin,
            dest,
            strip: ACTION_STRIP_KEYS.to_vec(),
        }
    }

    /// Rewriter that also strips the keys specific to an action class
    pub fn for_class(origin: &'a Snapshot, dest: &'a Snapshot, class: ActionClass) -> Self {
        let mut rewriter = Self::new(origin, dest);
        rewriter.strip.extend_from_slice(class.extra_strip_keys());
        rewriter
    }

    pub fn rewrite(&self, action: ActionPayload) -> Rewritten {
        let mut payload = match action {
            Value::String(text) => decode_document(&text).unwrap_or(Value::String(text)),
            other => other,
        };

        let action_name = payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut unresolved = Vec::new();
        self.walk(&mut payload, &mut unresolved);
        for reference in &mut unresolved {
            reference.action = action_name.clone();
        }

        Rewritten {
            payload,
            unresolved,
        }
    }

    fn walk(&self, node: &mut Value, unresolved: &mut Vec<UnresolvedReference>) {
        match node {
            Value::Object(map) => self.walk_map(map, unresolved),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(item, unresolved);
                }
            }
            Value::String(text) => {
                // Double-encoded sub-document: rewrite inside, keep it a string
                if let Some(mut inner) = decode_document(text) {
                    self.walk(&mut inner, unresolved);
                    *text = inner.to_string();
                }
            }
            _ => {}
        }
    }

    fn walk_map(&self, map: &mut Map<String, Value>, unresolved: &mut Vec<UnresolvedReference>) {
        map.retain(|key, _| !self.strip.contains(&key.as_str()));

        for (key, value) in map.iter_mut() {
            let kind = match key.as_str() {
                "templateid" => Some(ObjectKind::Template),
                "groupid" => Some(ObjectKind::HostGroup),
                _ => None,
            };

            match kind {
                Some(kind) if value.is_string() || value.is_number() => {
                    if let Some(reference) = self.remap(key, kind, value) {
                        unresolved.push(reference);
                    }
                }
                _ => self.walk(value, unresolved),
            }
        }
    }

    // Translate one scalar reference in place through origin id -> name ->
    // destination id. Returns the unresolved event when either side of the
    // join is missing.
    fn remap(
        &self,
        field: &str,
        kind: ObjectKind,
        value: &mut Value,
    ) -> Option<UnresolvedReference> {
        let id = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let unresolved = |name: Option<&str>| UnresolvedReference {
            field: field.to_string(),
            kind,
            id: id.clone(),
            name: name.map(str::to_string),
            action: None,
        };

        let Some(origin) = self.origin.find_by_id(kind, &id) else {
            return Some(unresolved(None));
        };
        let name = origin.name.as_str();
        let Some(current) = self.dest.find_by_name(kind, name) else {
            return Some(unresolved(Some(name)));
        };

        if current.id != id {
            log::debug!("Rewriting {field} {id} -> {} (\"{name}\")", current.id);
        }
        *value = Value::String(current.id.clone());
        None
    }
}

/// Parse text that looks like a serialized object or array
fn decode_document(text: &str) -> Option<Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Remove every occurrence of `keys`, at any depth
pub fn strip_keys(value: &mut Value, keys: &[&str]) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !keys.contains(&key.as_str()));
            for child in map.values_mut() {
                strip_keys(child, keys);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_keys(item, keys);
            }
        }
        _ => {}
    }
}

/// Rewrite `action` with the common action strip list
pub fn rewrite(action: ActionPayload, origin: &Snapshot, dest: &Snapshot) -> Rewritten {
    Rewriter::new(origin, dest).rewrite(action)
}
