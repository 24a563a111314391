use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};
use crate::kind::ObjectKind;
use crate::snapshot::ObjectRecord;

/// Compute the content fingerprint of a remote object
///
/// The identifier field is dropped and the rest of the object is serialized
/// with keys sorted at every level, so renumbering or field order never
/// changes the result. Returns the lowercase hex SHA-256 of that text.
pub fn fingerprint(payload: &Value, id_field: &str) -> Result<String> {
    let object = payload.as_object().ok_or_else(|| {
        MigrateError::InvalidPayload(format!(
            "expected an object to fingerprint, got {}",
            type_name(payload)
        ))
    })?;

    let mut content = Map::new();
    let mut keys: Vec<&String> = object.keys().filter(|k| k.as_str() != id_field).collect();
    keys.sort();
    for key in keys {
        content.insert(key.clone(), canonicalize(&object[key.as_str()]));
    }

    let serialized = serde_json::to_string(&Value::Object(content))
        .map_err(|e| MigrateError::InvalidPayload(e.to_string()))?;

    Ok(hex::encode(Sha256::digest(serialized.as_bytes())))
}

/// Build a snapshot record from a raw object returned by `<resource>.get`
pub fn record(kind: ObjectKind, payload: &Value) -> Result<ObjectRecord> {
    let id = scalar_field(payload, kind.id_field()).ok_or_else(|| {
        MigrateError::InvalidPayload(format!("{kind} object without {}", kind.id_field()))
    })?;
    let name = scalar_field(payload, kind.name_field()).ok_or_else(|| {
        MigrateError::InvalidPayload(format!(
            "{kind} {id} without {}",
            kind.name_field()
        ))
    })?;

    Ok(ObjectRecord {
        kind,
        id,
        name,
        fingerprint: fingerprint(payload, kind.id_field())?,
    })
}

/// Read a string or number field as text; Zabbix sends ids as strings but
/// hand-edited backups sometimes carry numbers
pub(crate) fn scalar_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Insert keys in sorted order so the output is ordered whether or not
// serde_json preserves insertion order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
