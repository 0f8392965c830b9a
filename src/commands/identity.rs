//! Commands: apply, delete, and compare account entities.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::{CompareOpts, EntityOpts};
use crate::entities::{self, EntitiesStore, Entity, EntityDifference};
use crate::logging::Logger;

/// Apply one entity document.
///
/// # Errors
///
/// Returns an error if the document cannot be read or the database update
/// fails.
pub fn apply(opts: &EntityOpts, log: &Logger) -> Result<()> {
    let entity = load_entity(&opts.entity)?;
    let path = target(&entity, opts.file.as_ref());
    log.info(&format!(
        "applying {} '{}' to {}",
        entity.kind(),
        entity.key(),
        path.display()
    ));
    let key = entity.key().to_string();
    entity
        .apply(&path, opts.safe)
        .with_context(|| format!("failed to apply '{key}' to {}", path.display()))
}

/// Delete one entity from its database.
///
/// # Errors
///
/// Returns an error if the document cannot be read or the database update
/// fails.
pub fn delete(opts: &EntityOpts, log: &Logger) -> Result<()> {
    let entity = load_entity(&opts.entity)?;
    let path = target(&entity, opts.file.as_ref());
    log.info(&format!(
        "deleting {} '{}' from {}",
        entity.kind(),
        entity.key(),
        path.display()
    ));
    entity
        .delete(&path)
        .with_context(|| format!("failed to delete '{}' from {}", entity.key(), path.display()))
}

/// Compare entity documents against the live databases and print the result.
///
/// # Errors
///
/// Returns an error if a spec directory or a database cannot be read.
#[allow(clippy::print_stdout)]
pub fn compare(opts: &CompareOpts, log: &Logger) -> Result<()> {
    let differences = differences(opts)?;
    log.debug(&format!("{} difference(s)", differences.len()));
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&differences)?);
    } else {
        print!("{}", render_table(&differences));
    }
    Ok(())
}

/// Desired state from `opts.specs` compared with the databases named in `opts`.
///
/// # Errors
///
/// Returns an error if a spec directory or a database cannot be read.
pub fn differences(opts: &CompareOpts) -> Result<Vec<EntityDifference>> {
    let mut desired = EntitiesStore::new();
    for dir in &opts.specs {
        desired
            .load(dir)
            .with_context(|| format!("failed to load entity documents from {}", dir.display()))?;
    }
    let or_default = |p: Option<&PathBuf>| p.cloned().unwrap_or_default();
    let live = EntitiesStore::from_databases(
        &or_default(opts.users_file.as_ref()),
        &or_default(opts.groups_file.as_ref()),
        &or_default(opts.shadow_file.as_ref()),
        &or_default(opts.gshadow_file.as_ref()),
    )
    .context("failed to read the live databases")?;
    Ok(entities::compare(&desired, &live))
}

/// Render differences as an aligned `Kind Name Missing Difference` table.
#[must_use]
pub fn render_table(differences: &[EntityDifference]) -> String {
    let header = ["Kind", "Name", "Missing", "Difference"];
    let rows: Vec<[String; 4]> = differences
        .iter()
        .map(|d| {
            [
                d.kind.to_string(),
                d.name.clone(),
                d.missing.to_string(),
                d.description.clone(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 4]| {
        let mut text = String::new();
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if i + 1 == cells.len() {
                text.push_str(cell);
            } else {
                let _ = write!(text, "{cell:<width$}  ");
            }
        }
        out.push_str(text.trim_end());
        out.push('\n');
    };
    line(header);
    for [kind, name, missing, description] in &rows {
        line([kind.as_str(), name.as_str(), missing.as_str(), description.as_str()]);
    }
    out
}

/// Read a document from a path, or treat the argument as inline YAML.
fn load_entity(arg: &str) -> Result<Entity> {
    let path = Path::new(arg);
    if path.is_file() {
        return Entity::from_file(path)
            .with_context(|| format!("failed to load entity document {arg}"));
    }
    Entity::from_yaml(arg).context("failed to parse inline entity document")
}

fn target(entity: &Entity, file: Option<&PathBuf>) -> PathBuf {
    file.cloned().unwrap_or_else(|| entity.default_path())
}
