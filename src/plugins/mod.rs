//! Conditionals and effect plugins applied to each step.
//!
//! Both kinds implement [`Plugin`]: given a step and a [`Context`] they
//! succeed or describe a failure.  The executor runs every conditional in
//! [`default_conditionals`] order, stopping the step at the first failure,
//! then every effect plugin in [`default_plugins`] order, recording failures
//! and carrying on.
pub mod commands;
pub mod conditionals;
mod context;
pub mod directories;
pub mod download;
pub mod entities;
pub mod environment;
pub mod files;
pub mod git;
pub mod helpers;
pub mod hostname;
pub mod modules;
pub mod sysctl;
pub mod systemctl;
pub mod timesyncd;

pub use context::Context;
#[cfg(test)]
pub(crate) use context::test_context;

use anyhow::{Result, anyhow};

use crate::config::Step;

/// A named capability applied to one step.
///
/// Effect plugins are no-ops when their part of the step is empty, and
/// report failures instead of aborting.
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Apply the plugin to `step`.
    ///
    /// # Errors
    ///
    /// Returns an error describing every part of the step that failed; for a
    /// conditional, why the step must be skipped.
    fn run(&self, step: &Step, ctx: &Context) -> Result<()>;
}

/// Step gates, in evaluation order.
#[must_use]
pub fn default_conditionals() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(conditionals::NodeMatch),
        Box::new(conditionals::ShellIf),
    ]
}

/// Effect plugins, in application order.
#[must_use]
pub fn default_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(download::Downloads),
        Box::new(git::GitCheckout),
        Box::new(entities::EnsureEntities),
        Box::new(directories::EnsureDirectories),
        Box::new(files::EnsureFiles),
        Box::new(commands::Commands),
        Box::new(entities::DeleteEntities),
        Box::new(hostname::Hostname),
        Box::new(sysctl::Sysctl),
        Box::new(modules::LoadModules),
        Box::new(timesyncd::Timesyncd),
        Box::new(systemctl::Systemctl),
        Box::new(environment::Environment),
    ]
}

/// Fold per-item errors into one result.
///
/// A single error is returned unchanged; several are joined with `; `.
/// Logging is left to the executor, which reports the folded error once.
pub(crate) fn combine(errors: Vec<anyhow::Error>) -> Result<()> {
    let mut errors = errors.into_iter();
    let Some(first) = errors.next() else {
        return Ok(());
    };
    let rest: Vec<String> = errors.map(|e| format!("{e:#}")).collect();
    if rest.is_empty() {
        return Err(first);
    }
    Err(anyhow!("{first:#}; {}", rest.join("; ")))
}
