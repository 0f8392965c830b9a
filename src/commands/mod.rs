//! Top-level subcommand orchestration.
pub mod completions;
pub mod identity;
pub mod run;
pub mod version;
