use std::path::PathBuf;

use crate::kind::ObjectKind;

/// Errors raised by the migration engine
///
/// Handlers wrap these in `anyhow` with context; the restore orchestrator
/// matches on the remote variants to decide between retrying, swallowing and
/// aborting.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A payload handed to the fingerprint engine was not a mapping, or lacked
    /// the fields its kind requires
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A persisted snapshot could not be read back
    #[error("corrupt snapshot at {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// An identifier reference could not be mapped through both snapshots
    #[error("unresolved {field} reference {id} ({kind})")]
    ReferenceUnresolved {
        field: String,
        kind: ObjectKind,
        id: String,
    },

    /// The platform refused a create or import because an object collides
    #[error("conflict on {method}: {message}")]
    RemoteConflict { method: String, message: String },

    /// The platform reported that the referred object does not exist
    #[error("not found on {method}: {message}")]
    RemoteNotFound { method: String, message: String },

    /// The session was refused or has expired
    #[error("not authorized on {method}: {message}")]
    Unauthorized { method: String, message: String },

    /// Any other error reported by the API
    #[error("API error {code} on {method}: {message} {data}")]
    Remote {
        method: String,
        code: i64,
        message: String,
        data: String,
    },

    /// The request never produced an API answer (network, TLS, bad body)
    #[error("transport error on {method}: {message}")]
    Transport { method: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MigrateError::CorruptSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the platform rejected the request because of a colliding object
    pub fn is_conflict(&self) -> bool {
        matches!(self, MigrateError::RemoteConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrateError::RemoteNotFound { .. })
    }

    /// Errors after which no further request can be expected to succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Transport { .. }
                | MigrateError::Unauthorized { .. }
                | MigrateError::Io { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
