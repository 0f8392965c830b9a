//! `[Time]` settings for `systemd-timesyncd`.
use std::fs;
use std::io::ErrorKind;

use anyhow::{Context as _, Result};

use crate::config::Step;

use super::{Context, Plugin};

const TIMESYNCD_CONF: &str = "/etc/systemd/timesyncd.conf";
const SECTION: &str = "Time";

/// Sets the step's `timesyncd` keys in `/etc/systemd/timesyncd.conf`,
/// keeping every other line of the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timesyncd;

impl Plugin for Timesyncd {
    fn name(&self) -> &'static str {
        "timesyncd"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        if step.timesyncd.is_empty() {
            return Ok(());
        }
        let path = ctx.resolve(TIMESYNCD_CONF);
        let current = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("failed to read {TIMESYNCD_CONF}")),
        };
        let pairs: Vec<(&str, &str)> = step
            .timesyncd
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fs::write(&path, set_section_keys(&current, SECTION, &pairs))
            .with_context(|| format!("failed to write {TIMESYNCD_CONF}"))
    }
}

/// Set `pairs` inside `[section]` of an INI document.
///
/// Existing keys are replaced in place, new keys are appended to the end of
/// the section, and the section is created when absent.
fn set_section_keys(content: &str, section: &str, pairs: &[(&str, &str)]) -> String {
    let header = format!("[{section}]");
    let mut out: Vec<String> = Vec::new();
    let mut pending: Vec<(&str, &str)> = pairs.to_vec();
    let mut in_section = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if in_section {
                flush(&mut out, &mut pending);
            }
            in_section = trimmed == header;
            out.push(line.to_string());
            continue;
        }
        if in_section
            && let Some((key, _)) = trimmed.split_once('=')
            && let Some(i) = pending.iter().position(|(k, _)| *k == key.trim())
        {
            let (k, v) = pending.remove(i);
            out.push(format!("{k}={v}"));
            continue;
        }
        out.push(line.to_string());
    }

    if in_section {
        flush(&mut out, &mut pending);
    } else if !pending.is_empty() {
        out.push(header);
        flush(&mut out, &mut pending);
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Write the remaining keys after the last non-blank line of the section
/// being closed.
fn flush(out: &mut Vec<String>, pending: &mut Vec<(&str, &str)>) {
    let at = out
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(out.len(), |i| i + 1);
    let added: Vec<String> = pending.drain(..).map(|(k, v)| format!("{k}={v}")).collect();
    out.splice(at..at, added);
}
