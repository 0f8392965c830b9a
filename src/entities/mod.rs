//! Typed records for the four colon-delimited account databases.
//!
//! Each database kind (`passwd`, `group`, `shadow`, `gshadow`) has one record
//! type implementing [`Record`].  The read-modify-write algorithms in
//! [`database`] are written once against that trait, and [`Entity`] wraps
//! the four kinds for callers that only know the kind at runtime (entity
//! documents, the store, the comparison engine).

pub mod compare;
mod crypt;
pub mod database;
mod error;
pub mod group;
pub mod gshadow;
pub mod range;
pub mod shadow;
pub mod store;
pub mod user;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

pub use compare::{EntityDifference, compare};
pub use error::EntityError;
pub use group::Group;
pub use gshadow::GShadow;
pub use shadow::Shadow;
pub use store::EntitiesStore;
pub use user::User;

/// Database kind of an entity, used as the document discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A `passwd` record.
    User,
    /// A `group` record.
    Group,
    /// A `shadow` record.
    Shadow,
    /// A `gshadow` record.
    #[serde(rename = "gshadow")]
    GShadow,
}

impl EntityKind {
    /// The discriminator value used in entity documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Shadow => "shadow",
            Self::GShadow => "gshadow",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "shadow" => Ok(Self::Shadow),
            "gshadow" => Ok(Self::GShadow),
            other => Err(EntityError::UnsupportedKind(other.to_string())),
        }
    }
}

/// One record type of an account database.
///
/// Implementors describe field layout only; creation, deletion, and
/// reconciliation live in [`database`] and behave identically for every kind.
pub trait Record: Clone + fmt::Debug + Serialize {
    /// Which database this record belongs to.
    const KIND: EntityKind;

    /// Environment variable overriding [`Record::SYSTEM_PATH`].
    const PATH_ENV: &'static str;

    /// Location of the live database.
    const SYSTEM_PATH: &'static str;

    /// The identity key (first field of the line).
    fn key(&self) -> &str;

    /// Canonical line for this record, without the trailing newline.
    fn to_line(&self) -> String;

    /// Parse one database line.  Returns `None` for blank lines.
    fn parse_line(line: &str) -> Option<Self>;

    /// Numeric id checked for collisions by a safe apply.
    fn numeric_id(&self) -> Option<i64> {
        None
    }

    /// Resolve deferred fields before the record is written to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred value (allocated id, referenced group)
    /// cannot be resolved.
    fn prepare(self, _path: &Path) -> Result<Self, EntityError> {
        Ok(self)
    }

    /// Default database path, honouring the [`Record::PATH_ENV`] override.
    #[must_use]
    fn default_path() -> PathBuf {
        std::env::var(Self::PATH_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map_or_else(|| PathBuf::from(Self::SYSTEM_PATH), PathBuf::from)
    }
}

/// An account record of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    /// A `passwd` record.
    User(User),
    /// A `group` record.
    Group(Group),
    /// A `shadow` record.
    Shadow(Shadow),
    /// A `gshadow` record.
    #[serde(rename = "gshadow")]
    GShadow(GShadow),
}

/// Evaluate `$body` with `$r` bound to the record inside any [`Entity`] variant.
macro_rules! with_record {
    ($entity:expr, $r:ident => $body:expr) => {
        match $entity {
            Entity::User($r) => $body,
            Entity::Group($r) => $body,
            Entity::Shadow($r) => $body,
            Entity::GShadow($r) => $body,
        }
    };
}

impl Entity {
    /// Parse an entity document: a YAML mapping with a `kind` discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::Document`] for malformed YAML or fields, and
    /// [`EntityError::UnsupportedKind`] for an unknown or missing `kind`.
    pub fn from_yaml(text: &str) -> Result<Self, EntityError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .parse::<EntityKind>()?;
        Ok(match kind {
            EntityKind::User => Self::User(serde_yaml::from_value(value)?),
            EntityKind::Group => Self::Group(serde_yaml::from_value(value)?),
            EntityKind::Shadow => Self::Shadow(serde_yaml::from_value(value)?),
            EntityKind::GShadow => Self::GShadow(serde_yaml::from_value(value)?),
        })
    }

    /// Read and parse an entity document from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn from_file(path: &Path) -> Result<Self, EntityError> {
        let text = std::fs::read_to_string(path).map_err(|e| EntityError::io(path, e))?;
        Self::from_yaml(&text)
    }

    /// Database kind of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Group(_) => EntityKind::Group,
            Self::Shadow(_) => EntityKind::Shadow,
            Self::GShadow(_) => EntityKind::GShadow,
        }
    }

    /// Identity key (username or group name).
    #[must_use]
    pub fn key(&self) -> &str {
        with_record!(self, r => r.key())
    }

    /// Canonical database line.
    #[must_use]
    pub fn to_line(&self) -> String {
        with_record!(self, r => r.to_line())
    }

    /// Database path used when an operation is given an empty path.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        match self {
            Self::User(_) => User::default_path(),
            Self::Group(_) => Group::default_path(),
            Self::Shadow(_) => Shadow::default_path(),
            Self::GShadow(_) => GShadow::default_path(),
        }
    }

    /// Look a user's primary group name up in `path` rather than the default
    /// group database.  Other kinds are returned unchanged.
    #[must_use]
    pub fn with_group_database(self, path: PathBuf) -> Self {
        match self {
            Self::User(user) => Self::User(User {
                group_database: Some(path),
                ..user
            }),
            other => other,
        }
    }

    /// Append this entity to `path` (the kind's default database when empty).
    ///
    /// # Errors
    ///
    /// See [`database::create`].
    pub fn create(self, path: &Path) -> Result<(), EntityError> {
        with_record!(self, r => database::create(r, path))
    }

    /// Remove this entity's exact line from `path`.
    ///
    /// # Errors
    ///
    /// See [`database::delete`].
    pub fn delete(&self, path: &Path) -> Result<(), EntityError> {
        with_record!(self, r => database::delete(r, path))
    }

    /// Reconcile `path` with this entity.
    ///
    /// # Errors
    ///
    /// See [`database::apply`].
    pub fn apply(self, path: &Path, safe: bool) -> Result<(), EntityError> {
        with_record!(self, r => database::apply(r, path, safe))
    }
}

/// Deserialize a YAML scalar of any type into its string form.
///
/// Aging fields and password strings are often written unquoted, so
/// `expire: 6` must read the same as `expire: "6"`.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize as _;
    use serde_yaml::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_document() {
        let entity = Entity::from_yaml(
            "kind: group\ngroup_name: foo\npassword: xx\ngid: 1\nusers: one,two,tree\n",
        )
        .unwrap();
        assert_eq!(entity.kind(), EntityKind::Group);
        assert_eq!(entity.key(), "foo");
        assert_eq!(entity.to_line(), "foo:xx:1:one,two,tree");
    }

    #[test]
    fn parses_user_document() {
        let entity = Entity::from_yaml(
            "kind: user\nusername: foo\npassword: x\nuid: 1000\ngid: 100\ninfo: Foo\nhomedir: /home/foo\nshell: /bin/bash\n",
        )
        .unwrap();
        assert_eq!(entity.to_line(), "foo:x:1000:100:Foo:/home/foo:/bin/bash");
    }

    #[test]
    fn parses_shadow_document_with_numeric_aging_fields() {
        let entity = Entity::from_yaml(
            "kind: shadow\nusername: foo\npassword: $bar\nlast_changed: 1\nminimum_changed: 2\nmaximum_changed: 3\nwarn: 4\ninactive: 5\nexpire: 6\n",
        )
        .unwrap();
        assert_eq!(entity.to_line(), "foo:$bar:1:2:3:4:5:6:");
    }

    #[test]
    fn parses_gshadow_document() {
        let entity = Entity::from_yaml(
            "kind: gshadow\nname: test\npassword: \"!\"\nadministrators: foo,bar\nmembers: foo,baz\n",
        )
        .unwrap();
        assert_eq!(entity.to_line(), "test:!:foo,bar:foo,baz");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Entity::from_yaml("kind: printer\nname: lp\n").unwrap_err();
        assert!(matches!(err, EntityError::UnsupportedKind(k) if k == "printer"));
    }

    #[test]
    fn missing_kind_is_rejected() {
        let err = Entity::from_yaml("username: foo\n").unwrap_err();
        assert!(matches!(err, EntityError::UnsupportedKind(_)));
    }

    #[test]
    fn malformed_yaml_is_a_document_error() {
        let err = Entity::from_yaml("kind: [user").unwrap_err();
        assert!(matches!(err, EntityError::Document(_)));
    }

    #[test]
    fn entity_serializes_with_kind_tag() {
        let entity = Entity::from_yaml("kind: gshadow\nname: adm\n").unwrap();
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "gshadow");
        assert_eq!(json["name"], "adm");
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            EntityKind::User,
            EntityKind::Group,
            EntityKind::Shadow,
            EntityKind::GShadow,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }
}
