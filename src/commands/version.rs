//! Command: print version information.

/// Build version: `BOOTCONF_VERSION` from the build script, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("BOOTCONF_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the bootconf version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("bootconf {}", version());
}
