//! `shadow` records.
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{EntityError, EntityKind, Record, crypt};

/// `last_changed` value replaced by the current day count on apply.
pub const LAST_CHANGED_NOW: &str = "now";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A `shadow` line:
/// `username:password:last_changed:min:max:warn:inactive:expire:`.
///
/// Aging fields are kept as strings because every one of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shadow {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Password hash, lock marker, or plaintext to be hashed on apply.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub password: String,
    /// Days since the epoch of the last password change, or `now`.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub last_changed: String,
    /// Minimum password age in days.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub minimum_changed: String,
    /// Maximum password age in days.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub maximum_changed: String,
    /// Warning period in days.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub warn: String,
    /// Inactivity period in days.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub inactive: String,
    /// Account expiry as days since the epoch.
    #[serde(default, deserialize_with = "super::scalar_string")]
    pub expire: String,
}

/// Whether `password` is already a hash or a lock marker.
fn is_encoded(password: &str) -> bool {
    password.is_empty() || password.starts_with(['$', '!', '*'])
}

fn days_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() / SECONDS_PER_DAY)
}

impl Record for Shadow {
    const KIND: EntityKind = EntityKind::Shadow;
    const PATH_ENV: &'static str = "ENTITY_DEFAULT_SHADOW";
    const SYSTEM_PATH: &'static str = "/etc/shadow";

    fn key(&self) -> &str {
        &self.username
    }

    fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:",
            self.username,
            self.password,
            self.last_changed,
            self.minimum_changed,
            self.maximum_changed,
            self.warn,
            self.inactive,
            self.expire
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let mut fields = line.split(':').map(str::to_string);
        let mut next = || fields.next().unwrap_or_default();
        Some(Self {
            username: next(),
            password: next(),
            last_changed: next(),
            minimum_changed: next(),
            maximum_changed: next(),
            warn: next(),
            inactive: next(),
            expire: next(),
        })
    }

    fn prepare(mut self, _path: &Path) -> Result<Self, EntityError> {
        if self.last_changed == LAST_CHANGED_NOW {
            self.last_changed = days_since_epoch().to_string();
        }
        if !is_encoded(&self.password) {
            self.password = crypt::sha512_crypt(&self.password, &crypt::random_salt());
        }
        Ok(self)
    }
}
