//! Shared state handed to every plugin and conditional.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::exec::{Console, ShellConsole};
use crate::logging::Log;
use crate::operations::{FileSystem, HostFs, RootedFs};
use crate::platform::SystemInfo;
use crate::template;

/// Everything a plugin or conditional may touch.
pub struct Context {
    /// Logger for output and step recording.
    pub log: Arc<dyn Log>,
    /// Where absolute host paths really live.
    pub fs: Arc<dyn FileSystem>,
    /// Shell command runner.
    pub console: Arc<dyn Console>,
    /// Host facts captured once at startup.
    pub system: Arc<SystemInfo>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log", &"<dyn Log>")
            .field("fs", &self.fs)
            .field("console", &"<dyn Console>")
            .field("system", &self.system)
            .finish()
    }
}

impl Context {
    /// Creates a context from its parts.
    #[must_use]
    pub fn new(
        log: Arc<dyn Log>,
        fs: Arc<dyn FileSystem>,
        console: Arc<dyn Console>,
        system: Arc<SystemInfo>,
    ) -> Self {
        Self {
            log,
            fs,
            console,
            system,
        }
    }

    /// Context acting on the running host: `sh -c`, detected facts, and
    /// absolute paths re-rooted below `root` when one is given.
    #[must_use]
    pub fn host(log: Arc<dyn Log>, root: Option<&Path>) -> Self {
        let fs: Arc<dyn FileSystem> = match root {
            Some(root) => Arc::new(RootedFs::new(root)),
            None => Arc::new(HostFs),
        };
        Self::new(
            log,
            fs,
            Arc::new(ShellConsole),
            Arc::new(SystemInfo::detect()),
        )
    }

    /// Create a copy of this context with a different console.
    #[must_use]
    pub fn with_console(&self, console: Arc<dyn Console>) -> Self {
        Self {
            log: Arc::clone(&self.log),
            fs: Arc::clone(&self.fs),
            console,
            system: Arc::clone(&self.system),
        }
    }

    /// Location of the host path `path`.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.fs.resolve(path.as_ref())
    }

    /// Render `s` against the host facts.
    #[must_use]
    pub fn render(&self, s: &str) -> String {
        template::render_system(self.log.as_ref(), s, &self.system)
    }
}

/// A context rooted in a fresh temporary directory, with hostname
/// `test-host` and the real shell console.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn test_context() -> (Context, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let ctx = Context::new(
        Arc::new(crate::logging::Logger::new("test")),
        Arc::new(RootedFs::new(tmp.path())),
        Arc::new(ShellConsole),
        Arc::new(SystemInfo::with_hostname("test-host")),
    );
    (ctx, tmp)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::MockConsole;

    #[test]
    fn resolve_goes_through_filesystem() {
        let (ctx, tmp) = test_context();
        assert_eq!(ctx.resolve("/etc/hosts"), tmp.path().join("etc/hosts"));
    }

    #[test]
    fn host_context_is_rooted_on_request() {
        let log: Arc<dyn Log> = Arc::new(crate::logging::Logger::new("test"));
        let rooted = Context::host(Arc::clone(&log), Some(Path::new("/mnt/sysroot")));
        assert!(!rooted.fs.is_host());
        assert_eq!(rooted.resolve("/etc/hosts"), Path::new("/mnt/sysroot/etc/hosts"));
        assert!(Context::host(log, None).fs.is_host());
    }

    #[test]
    fn render_uses_host_facts() {
        let (ctx, _tmp) = test_context();
        assert_eq!(ctx.render("{{ .Values.node.hostname }}"), "test-host");
    }

    #[test]
    fn with_console_keeps_other_fields() {
        let (ctx, _tmp) = test_context();
        let swapped = ctx.with_console(Arc::new(MockConsole::new()));
        assert!(Arc::ptr_eq(&ctx.system, &swapped.system));
        assert!(Arc::ptr_eq(&ctx.fs, &swapped.fs));
    }

    #[test]
    fn debug_hides_trait_objects() {
        let (ctx, _tmp) = test_context();
        let out = format!("{ctx:?}");
        assert!(out.contains("<dyn Log>"));
        assert!(out.contains("test-host"));
    }
}
