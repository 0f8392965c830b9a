//! Translation of `#cloud-config` documents into stages.
//!
//! `runcmd`, `write_files` and `users` become one step of the `boot` stage;
//! `hostname` becomes a step of `initramfs`.  The same document is then read
//! as native YAML and its stages are appended after the translated ones.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

use super::{Config, EntityDeclaration, File, Step, loader};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CloudConfig {
    hostname: String,
    runcmd: Vec<Value>,
    write_files: Vec<WriteFile>,
    users: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WriteFile {
    path: String,
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    content: String,
    encoding: String,
    owner: String,
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    permissions: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CloudUser {
    name: String,
    #[serde(alias = "passwd")]
    hashed_passwd: String,
    gecos: String,
    homedir: String,
    shell: String,
    primary_group: String,
    #[serde(deserialize_with = "crate::entities::scalar_string")]
    uid: String,
}

/// Translate a cloud-init document.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] if the document is not a YAML mapping of
/// the expected shape, or [`ConfigError::Validation`] for unparsable file
/// permissions.
pub fn translate(text: &str, source_name: &str) -> Result<Config, ConfigError> {
    let yaml_err = |source| ConfigError::Yaml {
        source_name: source_name.to_string(),
        source,
    };
    let value: Value = serde_yaml::from_str(text).map_err(yaml_err)?;
    let cc: CloudConfig = if value.is_null() {
        CloudConfig::default()
    } else {
        serde_yaml::from_value(value).map_err(yaml_err)?
    };

    let files = cc
        .write_files
        .into_iter()
        .map(translate_file)
        .collect::<Result<Vec<_>, _>>()?;
    let mut ensure_entities = Vec::new();
    for user in &cc.users {
        ensure_entities.extend(translate_user(user));
    }

    let mut config = Config {
        name: "Cloud init".to_string(),
        ..Config::default()
    };
    config.stages.insert(
        "boot".to_string(),
        vec![Step {
            commands: cc.runcmd.iter().filter_map(command_line).collect(),
            files,
            ensure_entities,
            ..Step::default()
        }],
    );
    config.stages.insert(
        "initramfs".to_string(),
        vec![Step {
            hostname: cc.hostname,
            ..Step::default()
        }],
    );

    match loader::from_yaml(text, source_name) {
        Ok(native) => config.merge(native),
        Err(e) => tracing::debug!("{source_name} has no native stages: {e}"),
    }
    Ok(config)
}

/// `runcmd` entries are strings or argv lists.
fn command_line(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Sequence(argv) => Some(
            argv.iter()
                .filter_map(|a| match a {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

fn translate_file(wf: WriteFile) -> Result<File, ConfigError> {
    let permissions = if wf.permissions.is_empty() {
        0
    } else {
        u32::from_str_radix(wf.permissions.trim_start_matches("0o"), 8).map_err(|e| {
            ConfigError::Validation(format!(
                "converting permission {} for {}: {e}",
                wf.permissions, wf.path
            ))
        })?
    };
    Ok(File {
        path: wf.path,
        permissions,
        owner_string: wf.owner,
        content: wf.content,
        encoding: wf.encoding,
        ..File::default()
    })
}

/// A cloud-init user becomes a `user` entity, plus a `shadow` entity when a
/// password hash is given.  Users without a uid are allocated dynamically;
/// users without a primary group join `users` unless their uid doubles as gid.
fn translate_user(user: &Value) -> Vec<EntityDeclaration> {
    let user: CloudUser = match user {
        Value::String(name) => CloudUser {
            name: name.clone(),
            ..CloudUser::default()
        },
        other => match serde_yaml::from_value(other.clone()) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("skipping cloud-init user: {e}");
                return Vec::new();
            }
        },
    };
    if user.name.is_empty() || user.name == "default" {
        return Vec::new();
    }

    let uid = user.uid.parse::<i64>().unwrap_or(-1);
    let mut doc = Mapping::new();
    let mut set = |k: &str, v: Value| {
        doc.insert(Value::String(k.to_string()), v);
    };
    set("kind", "user".into());
    set("username", user.name.clone().into());
    set("password", "x".into());
    set("uid", uid.into());
    if !user.primary_group.is_empty() {
        set("group", user.primary_group.clone().into());
    } else if uid >= 0 {
        set("gid", uid.into());
    } else {
        set("group", "users".into());
    }
    set("info", user.gecos.clone().into());
    let homedir = if user.homedir.is_empty() {
        format!("/home/{}", user.name)
    } else {
        user.homedir.clone()
    };
    set("homedir", homedir.into());
    let shell = if user.shell.is_empty() {
        "/bin/sh".to_string()
    } else {
        user.shell.clone()
    };
    set("shell", shell.into());

    let mut out = vec![declaration(doc)];
    if !user.hashed_passwd.is_empty() {
        let mut shadow = Mapping::new();
        shadow.insert("kind".into(), "shadow".into());
        shadow.insert("username".into(), user.name.into());
        shadow.insert("password".into(), user.hashed_passwd.into());
        shadow.insert("last_changed".into(), "now".into());
        out.push(declaration(shadow));
    }
    out
}

fn declaration(doc: Mapping) -> EntityDeclaration {
    EntityDeclaration {
        path: String::new(),
        entity: serde_yaml::to_string(&Value::Mapping(doc)).unwrap_or_default(),
    }
}
