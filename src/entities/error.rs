//! Typed error variants for account database operations.
//!
//! Entity operations fail fast: the first structural problem is returned and
//! nothing is written after it.  Callers at plugin and command boundaries
//! convert to [`anyhow::Error`] via `?`.

use std::path::PathBuf;

use thiserror::Error;

use super::EntityKind;

/// Errors that arise from parsing, allocating, or mutating account records.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The entity document is not valid YAML or does not match its kind.
    #[error("failed to parse entity document: {0}")]
    Document(#[from] serde_yaml::Error),

    /// The document's `kind` discriminator names no known database.
    #[error("unsupported entity kind '{0}'")]
    UnsupportedKind(String),

    /// The record has no identity key (username or group name).
    #[error("empty {0} identity key")]
    EmptyKey(EntityKind),

    /// The identity key contains a field or line separator.
    #[error("invalid {kind} identity key {key:?}")]
    InvalidKey {
        /// Database kind of the rejected record.
        kind: EntityKind,
        /// The offending key.
        key: String,
    },

    /// Create was asked to add a key that already exists in the file.
    #[error("{kind} '{key}' is already present in {path}")]
    AlreadyPresent {
        /// Database kind of the conflicting record.
        kind: EntityKind,
        /// Identity key that already exists.
        key: String,
        /// Database file that was inspected.
        path: PathBuf,
    },

    /// A safe apply found the numeric id held by a different key.
    #[error("{kind} id {id} is already used by '{owner}'")]
    IdInUse {
        /// Database kind of the conflicting record.
        kind: EntityKind,
        /// The colliding uid or gid.
        id: i64,
        /// Identity key of the record that currently owns the id.
        owner: String,
    },

    /// Every id in the dynamic allocation window is taken.
    #[error("no free id in range {end}-{start}")]
    NoFreeId {
        /// Upper (first scanned) bound of the window.
        start: i64,
        /// Lower (last scanned) bound of the window.
        end: i64,
    },

    /// A user references a group that the live group database lacks.
    #[error("group '{0}' is not present")]
    GroupNotFound(String),

    /// Reading, stating, or writing a database file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl EntityError {
    /// Build an [`EntityError::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error reports a key or id collision.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyPresent { .. } | Self::IdInUse { .. })
    }

    /// Whether the error reports something absent (free id, file, or group).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NoFreeId { .. } | Self::GroupNotFound(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn already_present_display() {
        let e = EntityError::AlreadyPresent {
            kind: EntityKind::Group,
            key: "wheel".to_string(),
            path: PathBuf::from("/etc/group"),
        };
        assert_eq!(e.to_string(), "group 'wheel' is already present in /etc/group");
        assert!(e.is_conflict());
    }

    #[test]
    fn id_in_use_is_conflict() {
        let e = EntityError::IdInUse {
            kind: EntityKind::User,
            id: 1000,
            owner: "alice".to_string(),
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("alice"));
        assert!(e.is_conflict());
        assert!(!e.is_not_found());
    }

    #[test]
    fn no_free_id_display() {
        let e = EntityError::NoFreeId {
            start: 999,
            end: 500,
        };
        assert_eq!(e.to_string(), "no free id in range 500-999");
        assert!(e.is_not_found());
    }

    #[test]
    fn missing_file_is_not_found() {
        let e = EntityError::io(
            "/nonexistent/passwd",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(e.is_not_found());
        assert!(e.to_string().contains("/nonexistent/passwd"));
    }

    #[test]
    fn entity_error_converts_to_anyhow() {
        let e = EntityError::GroupNotFound("video".to_string());
        let _anyhow_err: anyhow::Error = e.into();
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn entity_error_is_send_sync() {
        assert_send_sync::<EntityError>();
    }
}
