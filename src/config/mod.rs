//! Configuration schema and the loaders that produce it.
//!
//! A [`Config`] maps stage names to ordered lists of [`Step`]s.  Every field
//! is optional; unknown keys are ignored so documents written for other
//! tools (cloud-init) can be read as well.

pub mod cloud_init;
pub mod dot_notation;
pub mod fetch;
pub mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use loader::{Format, load};

/// A loaded configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name of the document.
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    pub name: String,
    /// Steps per stage, in document order.
    pub stages: BTreeMap<String, Vec<Step>>,
}

impl Config {
    /// Append every stage of `other` after this document's steps.
    pub fn merge(&mut self, other: Self) {
        for (stage, steps) in other.stages {
            self.stages.entry(stage).or_default().extend(steps);
        }
    }
}

/// One fragment of declarations applied as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    /// Label used in logs and the summary.
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    pub name: String,
    /// Regex matched against the hostname; empty matches every host.
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    pub node: String,
    /// Shell command gating the step; non-zero exit skips it.
    #[serde(rename = "if", deserialize_with = "crate::entities::scalar_string")]
    pub if_cmd: String,
    /// Shell commands to run, in order.
    #[serde(deserialize_with = "de::scalar_list")]
    pub commands: Vec<String>,
    /// Files to write.
    pub files: Vec<File>,
    /// Directories to create.
    pub directories: Vec<Directory>,
    /// Hostname to set.
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    pub hostname: String,
    /// Kernel parameters, keyed by dotted name.
    #[serde(deserialize_with = "de::scalar_map")]
    pub sysctl: BTreeMap<String, String>,
    /// Variables merged into [`Step::environment_file`].
    #[serde(deserialize_with = "de::scalar_map")]
    pub environment: BTreeMap<String, String>,
    /// Target of [`Step::environment`]; `/etc/environment` when empty.
    pub environment_file: String,
    /// Kernel modules to load, each optionally followed by parameters.
    #[serde(deserialize_with = "de::scalar_list")]
    pub modules: Vec<String>,
    /// Unit state changes.
    pub systemctl: Systemctl,
    /// `[Time]` keys for `systemd-timesyncd`.
    #[serde(deserialize_with = "de::scalar_map")]
    pub timesyncd: BTreeMap<String, String>,
    /// Remote files to fetch.
    pub downloads: Vec<Download>,
    /// Repository to clone or update.
    pub git: Git,
    /// Entity documents to reconcile.
    pub ensure_entities: Vec<EntityDeclaration>,
    /// Entity documents to remove.
    pub delete_entities: Vec<EntityDeclaration>,
}

/// A file declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    /// Absolute target path.
    pub path: String,
    /// Mode bits; a YAML string is read as octal.
    #[serde(deserialize_with = "de::mode")]
    pub permissions: u32,
    /// Numeric owner; left unchanged when absent.
    pub owner: Option<u32>,
    /// Numeric group; left unchanged when absent.
    pub group: Option<u32>,
    /// `user[:group]` resolved through the account databases.
    pub owner_string: String,
    /// File content, possibly encoded.
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    pub content: String,
    /// `b64`, `gzip`, `gz+b64` and friends; empty for plain text.
    pub encoding: String,
}

/// A directory declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directory {
    /// Absolute target path.
    pub path: String,
    /// Mode bits; a YAML string is read as octal.
    #[serde(deserialize_with = "de::mode")]
    pub permissions: u32,
    /// Numeric owner; left unchanged when absent.
    pub owner: Option<u32>,
    /// Numeric group; left unchanged when absent.
    pub group: Option<u32>,
}

/// A download declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Download {
    /// Source URL.
    pub url: String,
    /// Target file, or an existing directory to download into.
    pub path: String,
    /// Mode bits; a YAML string is read as octal.
    #[serde(deserialize_with = "de::mode")]
    pub permissions: u32,
    /// Numeric owner; left unchanged when absent.
    pub owner: Option<u32>,
    /// Numeric group; left unchanged when absent.
    pub group: Option<u32>,
    /// `user[:group]` resolved through the account databases.
    pub owner_string: String,
    /// Whole-transfer timeout in seconds; `0` means none.
    pub timeout: u64,
}

/// `systemctl` verbs, each a list of unit names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Systemctl {
    /// Units to enable.
    pub enable: Vec<String>,
    /// Units to disable.
    pub disable: Vec<String>,
    /// Units to mask.
    pub mask: Vec<String>,
    /// Units to start.
    pub start: Vec<String>,
}

impl Systemctl {
    /// `(verb, units)` pairs in the order they are applied.
    #[must_use]
    pub fn verbs(&self) -> [(&'static str, &[String]); 4] {
        [
            ("enable", self.enable.as_slice()),
            ("disable", self.disable.as_slice()),
            ("mask", self.mask.as_slice()),
            ("start", self.start.as_slice()),
        ]
    }
}

/// A git checkout declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Git {
    /// Remote URL; the plugin is a no-op when empty.
    pub url: String,
    /// Checkout directory.
    pub path: String,
    /// Branch to check out; `master` when empty.
    pub branch: String,
    /// Fetch only [`Git::branch`].
    pub branch_only: bool,
    /// Credentials.
    pub auth: GitAuth,
}

/// Credentials for [`Git`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitAuth {
    /// HTTP user name, or SSH user (default `git`).
    pub username: String,
    /// HTTP password or token.
    pub password: String,
    /// PEM private key for SSH remotes.
    pub private_key: String,
    /// Skip TLS certificate and SSH host key checks.
    pub insecure: bool,
    /// Expected SSH host key (`<type> <base64>`).
    pub public_key: String,
}

/// An entity document and the database it targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDeclaration {
    /// Database file; the kind's default when empty.
    pub path: String,
    /// Entity document (YAML with a `kind` key).
    pub entity: String,
}

mod de {
    use std::collections::BTreeMap;

    use serde::Deserialize as _;
    use serde::de::Error as _;
    use serde_yaml::Value;

    fn scalar<E: serde::de::Error>(value: Value) -> Result<String, E> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(E::custom(format!("expected a scalar, found {other:?}"))),
        }
    }

    pub(super) fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Option::<Vec<Value>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(scalar)
            .collect()
    }

    pub(super) fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Option::<BTreeMap<String, Value>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| Ok((k, scalar(v)?)))
            .collect()
    }

    /// Integers are taken as-is; strings such as `"0644"` are octal.
    pub(super) fn mode<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| D::Error::custom(format!("invalid permissions {n}"))),
            Some(Value::String(s)) if s.is_empty() => Ok(0),
            Some(Value::String(s)) => u32::from_str_radix(s.trim_start_matches("0o"), 8)
                .map_err(|_| D::Error::custom(format!("invalid octal permissions '{s}'"))),
            Some(other) => Err(D::Error::custom(format!(
                "invalid permissions {other:?}"
            ))),
        }
    }
}
