//! Unit management through `systemctl`.
use anyhow::Result;

use crate::config::Step;
use crate::error::PluginError;
use crate::exec::run_each;

use super::{Context, Plugin, combine};

/// Runs `systemctl enable|disable|mask|start <unit>` for the step's units,
/// verb by verb.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl Plugin for Systemctl {
    fn name(&self) -> &'static str {
        "systemctl"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let verbs = step.systemctl.verbs();
        if verbs.iter().all(|(_, units)| units.is_empty()) {
            return Ok(());
        }
        if !ctx.console.has_program("systemctl") {
            return Err(PluginError::MissingProgram("systemctl".to_string()).into());
        }
        let errors = verbs
            .iter()
            .flat_map(|(verb, units)| run_each(ctx.console.as_ref(), &format!("systemctl {verb}"), units))
            .collect();
        combine(errors)
    }
}
