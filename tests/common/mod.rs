// Shared helpers for integration tests.
//
// Builds a plugin context rooted in a temporary directory so each test can
// run whole stages without touching the host.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use bootconf::exec::ShellConsole;
use bootconf::logging::{Log, Logger};
use bootconf::operations::RootedFs;
use bootconf::platform::SystemInfo;
use bootconf::plugins::Context;

/// Hostname reported by [`rooted_context`].
pub const HOSTNAME: &str = "node-1";

/// A context whose absolute paths land below `root`, with a fixed hostname
/// and the real `sh -c` console.
pub fn rooted_context(root: &Path) -> (Context, Arc<Logger>) {
    let log = Arc::new(Logger::new("test"));
    let shared: Arc<dyn Log> = log.clone();
    let ctx = Context::new(
        shared,
        Arc::new(RootedFs::new(root)),
        Arc::new(ShellConsole),
        Arc::new(SystemInfo::with_hostname(HOSTNAME)),
    );
    (ctx, log)
}

/// Write `content` to `dir/name`, creating parents, and return the path as a
/// source reference.
pub fn write_source(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create source dir");
    }
    std::fs::write(&path, content).expect("write source");
    path.display().to_string()
}
