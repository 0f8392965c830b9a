//! Filesystem root abstraction for dependency injection.
//!
//! Plugins address host paths such as `/etc/hostname`.  The [`FileSystem`]
//! trait decides where those paths really live: [`HostFs`] uses them as-is,
//! [`RootedFs`] re-roots them below a directory (a mounted sysroot, or a
//! temporary directory in tests).

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Maps absolute host paths to the paths actually touched on disk.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Translate `path` into the location to read or write.
    fn resolve(&self, path: &Path) -> PathBuf;

    /// Whether paths resolve to the running system, so kernel state
    /// (hostname, loaded modules) belongs to the same tree.
    fn is_host(&self) -> bool;
}

/// The running host's own filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl FileSystem for HostFs {
    fn resolve(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    fn is_host(&self) -> bool {
        true
    }
}

/// A filesystem tree mounted below `root`.
#[derive(Debug, Clone)]
pub struct RootedFs {
    root: PathBuf,
}

impl RootedFs {
    /// Re-root every resolved path below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory acting as `/`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSystem for RootedFs {
    fn resolve(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }

    fn is_host(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn host_fs_is_identity() {
        assert_eq!(
            HostFs.resolve(Path::new("/etc/hostname")),
            PathBuf::from("/etc/hostname")
        );
    }

    #[test]
    fn rooted_fs_reroots_absolute_paths() {
        let fs = RootedFs::new("/mnt/sysroot");
        assert_eq!(
            fs.resolve(Path::new("/etc/hosts")),
            PathBuf::from("/mnt/sysroot/etc/hosts")
        );
        assert_eq!(fs.resolve(Path::new("/")), PathBuf::from("/mnt/sysroot"));
    }

    #[test]
    fn rooted_fs_keeps_relative_paths_below_root() {
        let fs = RootedFs::new("/tmp/r");
        assert_eq!(
            fs.resolve(Path::new("var/lib/x")),
            PathBuf::from("/tmp/r/var/lib/x")
        );
        assert_eq!(fs.root(), Path::new("/tmp/r"));
    }

    #[test]
    fn only_host_fs_is_host() {
        assert!(HostFs.is_host());
        assert!(!RootedFs::new("/tmp/r").is_host());
    }
}
