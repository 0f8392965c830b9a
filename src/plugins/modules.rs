//! Kernel module loading.
use std::collections::HashSet;
use std::fs;

use anyhow::Result;

use crate::config::Step;
use crate::error::PluginError;

use super::{Context, Plugin, combine};

const PROC_MODULES: &str = "/proc/modules";

/// Loads the step's kernel `modules` with `modprobe`.
///
/// Each entry is a module name optionally followed by parameters
/// (`"loop max_loop=64"`).  Modules already listed in `/proc/modules` are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadModules;

impl Plugin for LoadModules {
    fn name(&self) -> &'static str {
        "modules"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.modules.is_empty() {
            return Ok(());
        }
        let loaded = loaded_modules(ctx);
        let pending: Vec<&String> = step
            .modules
            .iter()
            .filter(|m| {
                let name = m.split(' ').next().unwrap_or_default();
                !loaded.contains(name)
            })
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        if !ctx.console.has_program("modprobe") {
            return Err(PluginError::MissingProgram("modprobe".to_string()).into());
        }

        let mut errors = Vec::new();
        for module in pending {
            ctx.log.debug(&format!("loading module {module}"));
            if let Err(e) = ctx.console.run(&format!("modprobe {module}")) {
                errors.push(e);
            }
        }
        combine(errors)
    }
}

fn loaded_modules(ctx: &Context) -> HashSet<String> {
    match fs::read_to_string(ctx.resolve(PROC_MODULES)) {
        Ok(content) => content
            .lines()
            .filter_map(|l| l.split(' ').next())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            ctx.log.warn(&format!("cannot open {PROC_MODULES}: {e}"));
            HashSet::new()
        }
    }
}
