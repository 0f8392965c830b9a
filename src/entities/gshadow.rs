//! `gshadow` records.
use serde::{Deserialize, Serialize};

use super::{EntityKind, Record};

/// A `gshadow` line: `name:password:administrators:members`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GShadow {
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Group password hash or lock marker.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub password: String,
    /// Comma-joined administrator list.
    #[serde(default)]
    pub administrators: String,
    /// Comma-joined member list.
    #[serde(default)]
    pub members: String,
}

impl Record for GShadow {
    const KIND: EntityKind = EntityKind::GShadow;
    const PATH_ENV: &'static str = "ENTITY_DEFAULT_GSHADOW";
    const SYSTEM_PATH: &'static str = "/etc/gshadow";

    fn key(&self) -> &str {
        &self.name
    }

    fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.name, self.password, self.administrators, self.members
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let mut fields = line.split(':').map(str::to_string);
        let mut next = || fields.next().unwrap_or_default();
        Some(Self {
            name: next(),
            password: next(),
            administrators: next(),
            members: next(),
        })
    }
}
