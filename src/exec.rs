//! Shell command execution behind a mockable [`Console`].
use anyhow::{Context as _, Result, bail};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the command exited zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// Standard output followed by standard error.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Runs shell command lines on behalf of plugins and conditionals.
///
/// The production implementation is [`ShellConsole`]; unit tests use the
/// generated `MockConsole`.
#[cfg_attr(test, mockall::automock)]
pub trait Console: Send + Sync {
    /// Run `command` through `sh -c`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell cannot be spawned or the command exits
    /// non-zero.  The message carries the command's combined output.
    fn run(&self, command: &str) -> Result<ExecResult>;

    /// Whether `program` can be found on `PATH`.
    fn has_program(&self, program: &str) -> bool;
}

/// [`Console`] that spawns `sh -c <command>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellConsole;

impl Console for ShellConsole {
    fn run(&self, command: &str) -> Result<ExecResult> {
        tracing::debug!("running command `{command}`");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .with_context(|| format!("failed to execute: {command}"))?;
        let result = ExecResult::from(output);
        if !result.success {
            bail!(
                "failed to run {command} (exit {}): {}",
                result.code.unwrap_or(-1),
                result.combined().trim()
            );
        }
        Ok(result)
    }

    fn has_program(&self, program: &str) -> bool {
        which(program)
    }
}

/// Run `"{prefix} {item}"` for every item, continuing past failures.
///
/// Returns one error per failed item, in order.
pub fn run_each(console: &dyn Console, prefix: &str, items: &[String]) -> Vec<anyhow::Error> {
    items
        .iter()
        .filter_map(|item| console.run(&format!("{prefix} {item}")).err())
        .collect()
}

/// Check if a program is available on `PATH`.
#[must_use]
pub fn which(program: &str) -> bool {
    ::which::which(program).is_ok()
}
