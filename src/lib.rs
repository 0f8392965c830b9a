//! Declarative boot-time host configuration.
//!
//! `bootconf` applies YAML (or cloud-init, or dot-notation) documents to a
//! machine one named stage at a time, and reconciles the `passwd`, `group`,
//! `shadow` and `gshadow` databases against entity documents.
//!
//! The public API is organised into these layers:
//!
//! - **[`entities`]**: account database records and their atomic file edits
//! - **[`config`]**: the stage/step schema and the loaders that produce it
//! - **[`plugins`]**: conditionals and idempotent effect plugins
//! - **[`executor`]**: source resolution and ordered, best-effort stage runs
//! - **[`commands`]**: top-level subcommand orchestration (`run`, `identity`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod entities;
pub mod error;
pub mod exec;
pub mod executor;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod plugins;
pub mod template;
