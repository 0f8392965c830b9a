//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, parse_level, strip_ansi};

/// Target used for stage headers so formatters can render them distinctly.
pub(super) const STAGE_TARGET: &str = "bootconf::stage";

/// Environment variable holding a full [`tracing_subscriber::EnvFilter`] directive.
pub const FILTER_ENV: &str = "BOOTCONF_LOG";

/// Environment variable holding a plain console level name.
pub const LEVEL_ENV: &str = "LOGLEVEL";

#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Appends every event to the per-command log file, timestamped and with
/// ANSI codes stripped.
///
/// Always captures `DEBUG` and above whatever the console level is.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command`, write a run header, and open it
    /// for appending.
    ///
    /// Returns `None` when the log directory or file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version =
            option_env!("BOOTCONF_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "------------------------------------------\n\
             bootconf {version} {command} {}\n\
             ------------------------------------------\n",
            format_utc_datetime(),
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = strip_ansi(&extractor.message);
        let ts = format_utc_time();

        let line = match (*metadata.level(), metadata.target()) {
            (tracing::Level::INFO, STAGE_TARGET) => format!("[{ts}] ==> {msg}"),
            (tracing::Level::ERROR, _) => format!("[{ts}]     [error] {msg}"),
            (tracing::Level::WARN, _) => format!("[{ts}]     [warn] {msg}"),
            (tracing::Level::DEBUG | tracing::Level::TRACE, target) => {
                format!("[{ts}]     [debug] {target}: {msg}")
            }
            _ => format!("[{ts}]     {msg}"),
        };

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console formatter: coloured level tags, bold stage headers, dimmed debug.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = &extractor.message;

        match *metadata.level() {
            tracing::Level::ERROR => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            tracing::Level::WARN => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            tracing::Level::INFO if metadata.target() == STAGE_TARGET => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            tracing::Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Console verbosity: `-v` wins, then a recognised `LOGLEVEL`, else `INFO`.
#[must_use]
pub fn console_level(verbose: bool, loglevel: Option<&str>) -> LevelFilter {
    if verbose {
        return LevelFilter::DEBUG;
    }
    loglevel.and_then(parse_level).unwrap_or(LevelFilter::INFO)
}

/// Initialise the global [`tracing`] subscriber.
///
/// The console layer honours [`console_level`] as its default directive and
/// any extra directives in `BOOTCONF_LOG`.  Warnings and errors go to stderr,
/// the rest to stdout.  A file layer records everything at `DEBUG` and above
/// to `<cache>/bootconf/<command>.log`.  Call once at startup.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let level = console_level(verbose, std::env::var(LEVEL_ENV).ok().as_deref());
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(FILTER_ENV)
        .from_env_lossy();

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(filter);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_loglevel() {
        assert_eq!(console_level(true, Some("error")), LevelFilter::DEBUG);
    }

    #[test]
    fn loglevel_selects_console_level() {
        assert_eq!(console_level(false, Some("warning")), LevelFilter::WARN);
        assert_eq!(console_level(false, Some("error")), LevelFilter::ERROR);
        assert_eq!(console_level(false, Some("debug")), LevelFilter::DEBUG);
    }

    #[test]
    fn unknown_or_missing_loglevel_defaults_to_info() {
        assert_eq!(console_level(false, None), LevelFilter::INFO);
        assert_eq!(console_level(false, Some("chatty")), LevelFilter::INFO);
    }
}
