//! Stage execution: resolve sources, gate steps, run plugins.
//!
//! Processing is strictly sequential.  A conditional failure skips one step
//! and is only logged; a plugin failure is recorded and processing carries on
//! with the next plugin, step, and source.

mod report;
pub mod source;

pub use report::{Failures, StepFailure};
pub use source::Source;

use crate::config::{self, Config, Format, Step};
use crate::logging::StepStatus;
use crate::plugins::{self, Context, Plugin};

/// Applies the steps of one stage with a fixed set of conditionals and plugins.
#[derive(Debug)]
pub struct Executor {
    conditionals: Vec<Box<dyn Plugin>>,
    plugins: Vec<Box<dyn Plugin>>,
    format: Format,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Executor with the built-in conditionals and plugins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conditionals: plugins::default_conditionals(),
            plugins: plugins::default_plugins(),
            format: Format::Yaml,
        }
    }

    /// Replace the conditionals.
    #[must_use]
    pub fn with_conditionals(mut self, conditionals: Vec<Box<dyn Plugin>>) -> Self {
        self.conditionals = conditionals;
        self
    }

    /// Replace the effect plugins.
    #[must_use]
    pub fn with_plugins(mut self, plugins: Vec<Box<dyn Plugin>>) -> Self {
        self.plugins = plugins;
        self
    }

    /// Interpret every source as `format`.
    #[must_use]
    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Apply `stage` of `config`, loaded from `source`.
    pub fn apply(&self, stage: &str, config: &Config, source: &str, ctx: &Context) -> Failures {
        let mut failures = Failures::default();
        let Some(steps) = config.stages.get(stage).filter(|s| !s.is_empty()) else {
            ctx.log.debug(&format!("{source}: no steps for stage '{stage}'"));
            return failures;
        };

        for (index, step) in steps.iter().enumerate() {
            let label = step_label(stage, index, step);

            if let Some(reason) = self.gate(step, ctx) {
                ctx.log.warn(&format!("{label}: skipped: {reason}"));
                ctx.log.record_step(&label, StepStatus::Skipped, Some(&reason));
                continue;
            }

            ctx.log.info(&format!("{label} ({source})"));
            let mut errors = Vec::new();
            for plugin in &self.plugins {
                if let Err(e) = plugin.run(step, ctx) {
                    let error = format!("{e:#}");
                    ctx.log.error(&format!("{label}: {}: {error}", plugin.name()));
                    errors.push(format!("{}: {error}", plugin.name()));
                    failures.push(StepFailure {
                        stage: stage.to_string(),
                        source: source.to_string(),
                        step_index: Some(index),
                        step_name: step.name.clone(),
                        plugin: plugin.name().to_string(),
                        error,
                    });
                }
            }

            if errors.is_empty() {
                ctx.log.record_step(&label, StepStatus::Ok, None);
            } else {
                ctx.log
                    .record_step(&label, StepStatus::Failed, Some(&errors.join("; ")));
            }
        }
        failures
    }

    /// Load each of `sources` in order and apply `stage` from it.
    pub fn run(&self, stage: &str, sources: &[String], ctx: &Context) -> Failures {
        let mut failures = Failures::default();
        for reference in sources {
            for doc in Source::classify(reference).documents() {
                ctx.log.stage(&format!("{stage}: {}", doc.origin));
                let loaded = doc
                    .text
                    .and_then(|text| config::load(&text, &doc.origin, self.format));
                match loaded {
                    Ok(config) => failures.extend(self.apply(stage, &config, &doc.origin, ctx)),
                    Err(e) => {
                        ctx.log.error(&format!("{}: {e}", doc.origin));
                        failures.push(StepFailure::source(stage, &doc.origin, &e));
                    }
                }
            }
        }
        failures
    }

    /// First conditional failure, rendered as a skip reason.
    fn gate(&self, step: &Step, ctx: &Context) -> Option<String> {
        self.conditionals.iter().find_map(|c| {
            c.run(step, ctx)
                .err()
                .map(|e| format!("{}: {e:#}", c.name()))
        })
    }
}

fn step_label(stage: &str, index: usize, step: &Step) -> String {
    if step.name.is_empty() {
        format!("{stage}[{index}]")
    } else {
        format!("{stage}[{index}] {}", step.name)
    }
}
