//! Directory creation with mode and ownership.
use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::config::{Directory, Step};
use crate::error::PluginError;

use super::helpers::{Ownership, chmod, chown};
use super::{Context, Plugin, combine};

/// Creates the step's `directories`, including missing parents.
///
/// A directory that already exists only has its mode and ownership set;
/// parents created on the way get the same mode and ownership.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureDirectories;

impl Plugin for EnsureDirectories {
    fn name(&self) -> &'static str {
        "directories"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .directories
            .iter()
            .filter_map(|dir| ensure(ctx, dir).err())
            .collect();
        combine(errors)
    }
}

/// Create or update one directory.
///
/// # Errors
///
/// Returns [`PluginError::NotADirectory`] when the path exists as something
/// else, or the underlying I/O error.
pub fn ensure(ctx: &Context, dir: &Directory) -> Result<()> {
    ctx.log.debug(&format!("creating directory {}", dir.path));
    let path = ctx.resolve(&dir.path);
    let owner: Ownership = (dir.owner, dir.group);
    match fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => {
            chmod(&path, dir.permissions)?;
            chown(&path, owner)
        }
        Ok(_) => Err(PluginError::NotADirectory(dir.path.clone()).into()),
        Err(_) => create_all(&path, dir.permissions, owner),
    }
}

fn create_all(path: &Path, mode: u32, owner: Ownership) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        match fs::metadata(parent) {
            Ok(meta) if !meta.is_dir() => {
                return Err(PluginError::NotADirectory(parent.display().to_string()).into());
            }
            Ok(_) => {}
            Err(_) => create_all(parent, mode, owner)?,
        }
    }
    fs::create_dir(path).with_context(|| format!("mkdir {}", path.display()))?;
    chmod(path, mode)?;
    chown(path, owner)
}
