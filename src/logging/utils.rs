//! Helpers for log file placement, ANSI stripping, level parsing, and timestamps.
use std::fs;
use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

/// Remove CSI escape sequences (colours, cursor movement) from `s`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next_if_eq(&'[').is_some() {
            // Parameters and intermediates run until a final byte in '@'..='~'.
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        } else {
            chars.next();
        }
    }
    out
}

/// Directory for persistent logs: `$XDG_CACHE_HOME/bootconf/`, falling back
/// to `$HOME/.cache/bootconf/` and finally `/var/log/bootconf/` when no home
/// is set (early boot).
pub(super) fn cache_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))
        .unwrap_or_else(|| PathBuf::from("/var/log"));
    let dir = base.join("bootconf");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file path for `command`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(cache_dir()?.join(format!("{command}.log")))
}

/// Map a `LOGLEVEL` value to a console level.
///
/// Accepts `error`, `warning` (or `warn`), `info`, and `debug`,
/// case-insensitively.  Anything else yields `None`.
pub(super) fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "error" => Some(LevelFilter::ERROR),
        "warning" | "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        _ => None,
    }
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
