//! Shell commands run in order for each step.
use anyhow::Result;

use crate::config::Step;

use super::{Context, Plugin, combine};

/// Runs the step's `commands` in order through the console.
///
/// Each command is rendered against the host facts first.  A failing
/// command does not stop the ones after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Commands;

impl Plugin for Commands {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let mut errors = Vec::new();
        for cmd in &step.commands {
            let rendered = ctx.render(cmd);
            ctx.log.debug(&format!("running command: {rendered}"));
            match ctx.console.run(&rendered) {
                Ok(out) => {
                    let out = out.combined();
                    if !out.trim().is_empty() {
                        ctx.log.debug(out.trim_end());
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        combine(errors)
    }
}
