//! Domain-specific error types for bootconf.
//!
//! Internal modules return typed errors while plugin and command boundaries
//! convert them to [`anyhow::Error`] with the `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! BootconfError
//! ├── Entity(EntityError)  account database parsing and mutation
//! ├── Config(ConfigError)  source loading, decoding, fetching
//! └── Plugin(PluginError)  conditionals and effect plugins
//! ```

use thiserror::Error;

pub use crate::entities::EntityError;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum BootconfError {
    /// Account database error.
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// Configuration loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plugin or conditional error.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

/// Errors raised while turning a source into a [`Config`](crate::config::Config).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the schema.
    #[error("invalid configuration in {source_name}: {source}")]
    Yaml {
        /// Where the document came from.
        source_name: String,
        /// Underlying decoder error.
        source: serde_yaml::Error,
    },

    /// A local source could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Fetching a remote source failed at the transport level.
    #[error("failed to fetch {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// The remote server answered with a non-success status.
    #[error("fetching {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A value failed validation.
    #[error("{0}")]
    Validation(String),
}

/// Errors raised by conditionals and effect plugins.
#[derive(Error, Debug)]
pub enum PluginError {
    /// The step's `node` filter did not match the local hostname.
    #[error("node '{pattern}' does not match hostname '{hostname}'")]
    NodeMismatch {
        /// Filter from the step.
        pattern: String,
        /// Local hostname.
        hostname: String,
    },

    /// The step's `node` filter is not a valid regular expression.
    #[error("invalid node filter '{pattern}': {source}")]
    InvalidRegex {
        /// Filter from the step.
        pattern: String,
        /// Regex compilation error.
        source: regex::Error,
    },

    /// The step's `if` command exited non-zero.
    #[error("condition '{command}' failed: {output}")]
    IfFailed {
        /// Command that was run.
        command: String,
        /// Combined command output.
        output: String,
    },

    /// A `user[:group]` owner string names an unknown account.
    #[error("unknown owner '{0}'")]
    UnknownOwner(String),

    /// A file declares an encoding that cannot be decoded.
    #[error("unsupported encoding '{0}'")]
    UnsupportedEncoding(String),

    /// A directory declaration targets an existing non-directory.
    #[error("'{0}' already exists and it is not a directory")]
    NotADirectory(String),

    /// A required external program is missing from `PATH`.
    #[error("required program '{0}' not found")]
    MissingProgram(String),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn config_error_status_display() {
        let e = ConfigError::Status {
            url: "https://example.com/c.yaml".to_string(),
            status: 404,
        };
        assert_eq!(
            e.to_string(),
            "fetching https://example.com/c.yaml returned HTTP 404"
        );
    }

    #[test]
    fn config_error_io_has_source() {
        use std::error::Error as _;
        let e = ConfigError::Io {
            path: "/oem/99.yaml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("/oem/99.yaml"));
        assert!(e.source().is_some());
    }

    #[test]
    fn plugin_error_displays() {
        let e = PluginError::NodeMismatch {
            pattern: "^web-".to_string(),
            hostname: "db-1".to_string(),
        };
        assert_eq!(e.to_string(), "node '^web-' does not match hostname 'db-1'");
        assert_eq!(
            PluginError::NotADirectory("/etc/foo".to_string()).to_string(),
            "'/etc/foo' already exists and it is not a directory"
        );
    }

    #[test]
    fn bootconf_error_wraps_sub_errors() {
        let e: BootconfError = PluginError::UnknownOwner("nobody:ghost".to_string()).into();
        assert!(e.to_string().starts_with("Plugin error:"));
        let e: BootconfError = ConfigError::Validation("bad".to_string()).into();
        assert!(e.to_string().starts_with("Configuration error:"));
        let e: BootconfError = EntityError::GroupNotFound("wheel".to_string()).into();
        assert!(e.to_string().starts_with("Entity error:"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<BootconfError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<PluginError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let _e: anyhow::Error = ConfigError::Validation("x".to_string()).into();
        let _e: anyhow::Error = PluginError::MissingProgram("modprobe".to_string()).into();
    }
}
