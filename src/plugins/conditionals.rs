//! Step gates.
use anyhow::Result;
use regex::Regex;

use crate::config::Step;
use crate::error::PluginError;

use super::{Context, Plugin};

/// Passes when the step's `node` regex matches the local hostname.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeMatch;

impl Plugin for NodeMatch {
    fn name(&self) -> &'static str {
        "node"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.node.is_empty() {
            return Ok(());
        }
        let re = Regex::new(&step.node).map_err(|source| PluginError::InvalidRegex {
            pattern: step.node.clone(),
            source,
        })?;
        let hostname = &ctx.system.node.hostname;
        if re.is_match(hostname) {
            return Ok(());
        }
        Err(PluginError::NodeMismatch {
            pattern: step.node.clone(),
            hostname: hostname.clone(),
        }
        .into())
    }
}

/// Passes when the step's `if` command exits zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellIf;

impl Plugin for ShellIf {
    fn name(&self) -> &'static str {
        "if"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.if_cmd.is_empty() {
            return Ok(());
        }
        ctx.console
            .run(&step.if_cmd)
            .map_err(|e| PluginError::IfFailed {
                command: step.if_cmd.clone(),
                output: format!("{e:#}"),
            })?;
        Ok(())
    }
}
