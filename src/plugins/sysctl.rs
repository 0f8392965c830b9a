//! Kernel parameters written through `/proc/sys`.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::config::Step;

use super::{Context, Plugin, combine};

/// Writes each `sysctl` value to `/proc/sys/<key with . replaced by />`.
///
/// Entries are never chmodded: procfs rejects mode changes even for root.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sysctl;

impl Plugin for Sysctl {
    fn name(&self) -> &'static str {
        "sysctl"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .sysctl
            .iter()
            .filter_map(|(key, value)| {
                let path = ctx.resolve(proc_path(key));
                ctx.log.debug(&format!("sysctl {key}={value}"));
                fs::write(&path, value)
                    .with_context(|| format!("failed to set sysctl {key}"))
                    .err()
            })
            .collect();
        combine(errors)
    }
}

fn proc_path(key: &str) -> PathBuf {
    key.split('.')
        .fold(PathBuf::from("/proc/sys"), |path, part| path.join(part))
}
