//! Failures collected across a run.
use std::fmt;

/// One failure, with enough context to find the offending declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Stage being run.
    pub stage: String,
    /// File, URL or label of the document.
    pub source: String,
    /// Position of the step in the stage; `None` when the source itself failed.
    pub step_index: Option<usize>,
    /// Step `name`, possibly empty.
    pub step_name: String,
    /// Plugin that reported the error; empty for source failures.
    pub plugin: String,
    /// Error chain rendered on one line.
    pub error: String,
}

impl StepFailure {
    /// A failure to read or decode `source`.
    #[must_use]
    pub fn source(stage: &str, source: &str, error: &dyn fmt::Display) -> Self {
        Self {
            stage: stage.to_string(),
            source: source.to_string(),
            step_index: None,
            step_name: String::new(),
            plugin: String::new(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.source)?;
        if let Some(index) = self.step_index {
            write!(f, " step {index}")?;
            if !self.step_name.is_empty() {
                write!(f, " '{}'", self.step_name)?;
            }
        }
        if !self.plugin.is_empty() {
            write!(f, " ({})", self.plugin)?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Combined result of applying or running a stage, in the order failures
/// occurred.  Empty means success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failures(Vec<StepFailure>);

impl Failures {
    /// Whether nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record one failure.
    pub fn push(&mut self, failure: StepFailure) {
        self.0.push(failure);
    }

    /// Iterate in occurrence order.
    pub fn iter(&self) -> std::slice::Iter<'_, StepFailure> {
        self.0.iter()
    }
}

impl Extend<StepFailure> for Failures {
    fn extend<T: IntoIterator<Item = StepFailure>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Failures {
    type Item = StepFailure;
    type IntoIter = std::vec::IntoIter<StepFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Failures {
    type Item = &'a StepFailure;
    type IntoIter = std::slice::Iter<'a, StepFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let mut failures = Failures::default();
        failures.push(StepFailure {
            stage: "boot".to_string(),
            source: "/oem/90.yaml".to_string(),
            step_index: Some(2),
            step_name: "ntp".to_string(),
            plugin: "commands".to_string(),
            error: "exit status 1".to_string(),
        });
        failures.push(StepFailure::source("boot", "/oem/bad.yaml", &"invalid YAML"));
        insta::assert_snapshot!(failures.to_string(), @r"
        [boot] /oem/90.yaml step 2 'ntp' (commands): exit status 1
        [boot] /oem/bad.yaml: invalid YAML
        ");
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn empty_means_success() {
        let failures = Failures::default();
        assert!(failures.is_empty());
        assert_eq!(failures.to_string(), "");
    }
}
