//! Core logging types: step entries, status, and the [`Log`] trait.

/// Outcome of one step, collected for the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEntry {
    /// Display label, e.g. `boot[2] write hosts`.
    pub name: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Skip reason or failure description.
    pub message: Option<String>,
}

/// Status of a processed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Every plugin succeeded.
    Ok,
    /// A conditional gated the step out.
    Skipped,
    /// At least one plugin reported an error.
    Failed,
}

/// Abstraction over logging backends.
///
/// Plugins and the executor log through this trait so that tests can swap
/// in a recording implementation.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (suppressed on console unless verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a step result for the summary.
    fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>);
}
