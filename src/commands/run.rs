//! Command: apply one stage from configuration sources.
use std::sync::Arc;

use anyhow::{Result, bail};

use crate::cli::RunOpts;
use crate::config::Format;
use crate::executor::{Executor, Failures};
use crate::logging::{Log, Logger};
use crate::plugins::Context;

use super::version::version;

/// Run the `run` command.
///
/// # Errors
///
/// Returns an error if any source or step failed.  Every failure has already
/// been logged with its context by then.
pub fn run(opts: &RunOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("bootconf {}", version()));
    if let Some(root) = &opts.root {
        log.info(&format!("applying below {}", root.display()));
    }

    let shared: Arc<dyn Log> = log.clone();
    let ctx = Context::host(shared, opts.root.as_deref());
    let format = if opts.dot_notation {
        Format::DotNotation
    } else {
        Format::Yaml
    };

    let failures = Executor::new()
        .with_format(format)
        .run(&opts.stage, &opts.sources, &ctx);
    log.print_summary();
    finish(&opts.stage, &failures, log.as_ref())
}

fn finish(stage: &str, failures: &Failures, log: &dyn Log) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    log.error(&format!("{} error(s) in stage '{stage}':", failures.len()));
    for failure in failures {
        log.error(&format!("  {failure}"));
    }
    bail!("stage '{stage}' finished with {} error(s)", failures.len())
}
