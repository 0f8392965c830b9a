//! Turn document text into a [`Config`].
use crate::error::ConfigError;

use super::{Config, cloud_init, dot_notation};

/// First line marking a cloud-init document.
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// How document text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Native YAML, or cloud-init when the header is present.
    #[default]
    Yaml,
    /// Whitespace-separated `path=value` assignments.
    DotNotation,
}

/// Parse `text` read from `source_name`.
///
/// Blank or comment-only YAML yields an empty configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] if the text cannot be decoded, or a
/// validation error from the cloud-init translation.
pub fn load(text: &str, source_name: &str, format: Format) -> Result<Config, ConfigError> {
    match format {
        Format::DotNotation => Ok(dot_notation::parse(text)),
        Format::Yaml if is_cloud_config(text) => cloud_init::translate(text, source_name),
        Format::Yaml => from_yaml(text, source_name),
    }
}

/// Decode native YAML.
pub(super) fn from_yaml(text: &str, source_name: &str) -> Result<Config, ConfigError> {
    let yaml_err = |source| ConfigError::Yaml {
        source_name: source_name.to_string(),
        source,
    };
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(yaml_err)?;
    if value.is_null() {
        return Ok(Config::default());
    }
    serde_yaml::from_value(value).map_err(yaml_err)
}

fn is_cloud_config(text: &str) -> bool {
    text.lines()
        .next()
        .is_some_and(|l| l.trim_end() == CLOUD_CONFIG_HEADER)
}
