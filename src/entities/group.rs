//! `group` records.
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::range::IdRange;
use super::{EntityError, EntityKind, Record, database};

/// A `group` line: `name:password:gid:user1,user2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group name.
    #[serde(rename = "group_name", default)]
    pub name: String,
    /// Password field.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub password: String,
    /// Numeric group id; `None` serializes as an empty field, negative
    /// allocates from the dynamic range.
    #[serde(default)]
    pub gid: Option<i64>,
    /// Comma-joined member list.
    #[serde(default)]
    pub users: String,
}

impl Group {
    /// Member names, ignoring empty entries.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.users.split(',').filter(|u| !u.is_empty())
    }
}

impl Record for Group {
    const KIND: EntityKind = EntityKind::Group;
    const PATH_ENV: &'static str = "ENTITY_DEFAULT_GROUPS";
    const SYSTEM_PATH: &'static str = "/etc/group";

    fn key(&self) -> &str {
        &self.name
    }

    fn to_line(&self) -> String {
        let gid = self.gid.map(|g| g.to_string()).unwrap_or_default();
        format!("{}:{}:{gid}:{}", self.name, self.password, self.users)
    }

    fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let mut fields = line.split(':').map(str::to_string);
        let name = fields.next().unwrap_or_default();
        let password = fields.next().unwrap_or_default();
        let raw_gid = fields.next().unwrap_or_default();
        let gid = if raw_gid.is_empty() {
            None
        } else {
            raw_gid
                .parse::<i64>()
                .inspect_err(|e| tracing::warn!("invalid gid '{raw_gid}' for group {name}: {e}"))
                .ok()
        };
        Some(Self {
            name,
            password,
            gid,
            users: fields.next().unwrap_or_default(),
        })
    }

    fn numeric_id(&self) -> Option<i64> {
        self.gid
    }

    fn prepare(mut self, path: &Path) -> Result<Self, EntityError> {
        if self.gid.is_some_and(|g| g < 0) {
            let used: HashSet<i64> = database::parse_file::<Self>(path)?
                .values()
                .filter_map(|g| g.gid)
                .collect();
            let range = IdRange::from_env();
            self.gid = Some(range.first_free(&used).ok_or(EntityError::NoFreeId {
                start: range.start,
                end: range.end,
            })?);
        }
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn empty_member_list_keeps_trailing_colon() {
        let g = Group::parse_line("nm-openconnect:x:979:").unwrap();
        assert_eq!(g.gid, Some(979));
        assert_eq!(g.users, "");
        assert_eq!(g.to_line(), "nm-openconnect:x:979:");
    }

    #[test]
    fn nil_gid_serializes_empty() {
        let g = Group {
            name: "floating".to_string(),
            password: "x".to_string(),
            gid: None,
            users: "a,b".to_string(),
        };
        assert_eq!(g.to_line(), "floating:x::a,b");
        assert_eq!(Group::parse_line(&g.to_line()).unwrap(), g);
    }

    #[test]
    fn members_ignores_empty_entries() {
        let g = Group::parse_line("wheel:x:10:root,,alice").unwrap();
        assert_eq!(g.members().collect::<Vec<_>>(), vec!["root", "alice"]);
    }

    #[test]
    fn unparsable_gid_is_unset() {
        let g = Group::parse_line("odd:x:abc:").unwrap();
        assert_eq!(g.gid, None);
    }

    #[test]
    fn negative_gid_is_allocated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");
        fs::write(&path, "a:x:999:\n").unwrap();
        let g = Group {
            name: "dyn".to_string(),
            gid: Some(-1),
            ..Group::default()
        }
        .prepare(&path)
        .unwrap();
        assert_eq!(g.gid, Some(998));
    }

    #[test]
    fn document_without_gid_is_nil() {
        let g: Group = serde_yaml::from_str("group_name: foo\nusers: a\n").unwrap();
        assert_eq!(g.gid, None);
        assert_eq!(g.to_line(), "foo:::a");
    }
}
