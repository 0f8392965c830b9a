//! Account database reconciliation from entity documents.
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::config::{EntityDeclaration, Step};
use crate::entities::{Entity, Group, Record as _};

use super::{Context, Plugin, combine};

/// Applies each `ensure_entities` document (non-safe, so existing records
/// are rewritten).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureEntities;

impl Plugin for EnsureEntities {
    fn name(&self) -> &'static str {
        "entities"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .ensure_entities
            .iter()
            .filter_map(|decl| {
                let (entity, path) = match decode(ctx, decl) {
                    Ok(parsed) => parsed,
                    Err(e) => return Some(e),
                };
                ctx.log.debug(&format!(
                    "applying {} '{}' to {}",
                    entity.kind(),
                    entity.key(),
                    path.display()
                ));
                entity
                    .apply(&path, false)
                    .with_context(|| format!("failed to apply entity to {}", path.display()))
                    .err()
            })
            .collect();
        combine(errors)
    }
}

/// Removes each `delete_entities` document's exact line.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteEntities;

impl Plugin for DeleteEntities {
    fn name(&self) -> &'static str {
        "delete_entities"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .delete_entities
            .iter()
            .filter_map(|decl| {
                let (entity, path) = match decode(ctx, decl) {
                    Ok(parsed) => parsed,
                    Err(e) => return Some(e),
                };
                entity
                    .delete(&path)
                    .with_context(|| format!("failed to delete entity from {}", path.display()))
                    .err()
            })
            .collect();
        combine(errors)
    }
}

/// Render and parse the document; resolve the target database and, for
/// users, the group database below the same root.
fn decode(ctx: &Context, decl: &EntityDeclaration) -> Result<(Entity, PathBuf)> {
    let entity = Entity::from_yaml(&ctx.render(&decl.entity))?
        .with_group_database(ctx.resolve(Group::default_path()));
    let path = if decl.path.is_empty() {
        ctx.resolve(entity.default_path())
    } else {
        ctx.resolve(&decl.path)
    };
    Ok((entity, path))
}
