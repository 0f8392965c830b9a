//! `passwd` records.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::range::IdRange;
use super::{EntityError, EntityKind, Group, Record, database};

/// Gecos value written for users declared without one.
pub const DEFAULT_INFO: &str = "Created by bootconf";

/// A `passwd` line: `username:password:uid:gid:info:homedir:shell`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Password field (usually `x`, with the hash kept in `shadow`).
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub password: String,
    /// Numeric user id; negative means "allocate from the dynamic range".
    #[serde(default)]
    pub uid: i64,
    /// Primary group id; overridden by [`User::group`] when that is set.
    #[serde(default)]
    pub gid: i64,
    /// Primary group by name, resolved against the live group database.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// Group database that [`User::group`] is looked up in.  The kind's
    /// default group path when unset.
    #[serde(skip)]
    pub group_database: Option<PathBuf>,
    /// Gecos field.
    #[serde(default)]
    pub info: String,
    /// Home directory.
    #[serde(default)]
    pub homedir: String,
    /// Login shell.
    #[serde(default)]
    pub shell: String,
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;
    const PATH_ENV: &'static str = "ENTITY_DEFAULT_PASSWD";
    const SYSTEM_PATH: &'static str = "/etc/passwd";

    fn key(&self) -> &str {
        &self.username
    }

    fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.username, self.password, self.uid, self.gid, self.info, self.homedir, self.shell
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let mut fields = line.split(':');
        let mut next = || fields.next().unwrap_or_default().to_string();
        let username = next();
        let password = next();
        let raw_uid = next();
        let raw_gid = next();

        let uid = raw_uid.parse::<i64>().unwrap_or_else(|e| {
            tracing::warn!("invalid uid '{raw_uid}' for user {username}: {e}; using 0");
            0
        });
        let gid = raw_gid.parse::<i64>().unwrap_or_else(|e| {
            tracing::warn!("invalid gid '{raw_gid}' for user {username}: {e}; using uid {uid}");
            uid
        });

        Some(Self {
            username,
            password,
            uid,
            gid,
            group: String::new(),
            group_database: None,
            info: next(),
            homedir: next(),
            shell: next(),
        })
    }

    fn numeric_id(&self) -> Option<i64> {
        Some(self.uid)
    }

    fn prepare(mut self, path: &Path) -> Result<Self, EntityError> {
        if self.uid < 0 {
            let used: HashSet<i64> = database::parse_file::<Self>(path)?
                .values()
                .map(|u| u.uid)
                .collect();
            let range = IdRange::from_env();
            self.uid = range.first_free(&used).ok_or(EntityError::NoFreeId {
                start: range.start,
                end: range.end,
            })?;
        }

        if !self.group.is_empty() {
            let groups_path = self
                .group_database
                .clone()
                .unwrap_or_else(Group::default_path);
            let groups = database::parse_file::<Group>(&groups_path)?;
            self.gid = groups
                .get(&self.group)
                .and_then(|g| g.gid)
                .ok_or_else(|| EntityError::GroupNotFound(self.group.clone()))?;
            // Cleared so a second preparation is a no-op.
            self.group.clear();
        }

        if self.info.is_empty() {
            self.info = DEFAULT_INFO.to_string();
        }

        Ok(self)
    }
}
