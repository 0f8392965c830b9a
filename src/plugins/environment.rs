//! Merges variables into an environment file.
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::config::{Directory, Step};

use super::helpers::chmod;
use super::{Context, Plugin, directories};

const DEFAULT_FILE: &str = "/etc/environment";
const FILE_MODE: u32 = 0o644;

/// Merges the step's `environment` into `environment_file`.
///
/// Existing variables are kept unless the step sets them; values are
/// rendered against the host facts.  The file is rewritten sorted by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl Plugin for Environment {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.environment.is_empty() {
            return Ok(());
        }
        let target = if step.environment_file.is_empty() {
            DEFAULT_FILE
        } else {
            step.environment_file.as_str()
        };

        if let Some(parent) = Path::new(target).parent()
            && !ctx.resolve(parent).exists()
        {
            directories::ensure(
                ctx,
                &Directory {
                    path: parent.display().to_string(),
                    permissions: FILE_MODE | 0o100,
                    ..Directory::default()
                },
            )?;
        }

        let path = ctx.resolve(target);
        let current = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("failed to read {target}")),
        };
        let mut env = parse(&current);
        for (key, value) in &step.environment {
            env.insert(key.clone(), ctx.render(value));
        }

        fs::write(&path, serialize(&env)).with_context(|| format!("failed to write {target}"))?;
        chmod(&path, FILE_MODE)
    }
}

/// Read `KEY=VALUE` lines, tolerating `export`, comments and quotes.
fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let l = l.strip_prefix("export ").unwrap_or(l);
            let (key, value) = l.split_once('=')?;
            Some((key.trim().to_string(), unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        return inner.replace("\\\"", "\"").replace("\\\\", "\\");
    }
    if let Some(inner) = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
    {
        return inner.to_string();
    }
    value.to_string()
}

/// Integers are written bare, everything else double-quoted.
fn serialize(env: &BTreeMap<String, String>) -> String {
    env.iter()
        .map(|(k, v)| {
            if v.parse::<i64>().is_ok() {
                format!("{k}={v}\n")
            } else {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("{k}=\"{escaped}\"\n")
            }
        })
        .collect()
}
