//! Fetches the step's `downloads`.
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow, bail};
use url::Url;

use crate::config::fetch::{self, RETRY_COUNT, RETRY_DELAY};
use crate::config::{Download, Step};

use super::helpers::{chmod, chown, ownership};
use super::{Context, Plugin, combine};

/// How often transfer progress is logged.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads each entry to its `path`, then applies mode and ownership.
///
/// The transfer runs on a worker thread while the caller logs progress.
/// Data is written to a temporary file beside the target and renamed into
/// place, so a failed transfer leaves the target untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Downloads;

impl Plugin for Downloads {
    fn name(&self) -> &'static str {
        "download"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .downloads
            .iter()
            .filter_map(|dl| download(ctx, dl).err())
            .collect();
        combine(errors)
    }
}

fn download(ctx: &Context, dl: &Download) -> Result<()> {
    let target = target_path(&ctx.resolve(&dl.path), &dl.url)?;
    ctx.log
        .debug(&format!("downloading {} to {}", dl.url, target.display()));

    let transferred = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::channel();
    {
        let url = dl.url.clone();
        let dest = target.clone();
        let timeout = Duration::from_secs(dl.timeout);
        let counter = Arc::clone(&transferred);
        thread::spawn(move || {
            // The receiver only disappears if the caller is gone.
            let _ = tx.send(transfer(&url, &dest, timeout, &counter));
        });
    }

    loop {
        match rx.recv_timeout(PROGRESS_INTERVAL) {
            Ok(result) => {
                result.with_context(|| format!("failed to download {}", dl.url))?;
                break;
            }
            Err(RecvTimeoutError::Timeout) => ctx.log.debug(&format!(
                "  transferred {} bytes of {}",
                transferred.load(Ordering::Relaxed),
                dl.url
            )),
            Err(RecvTimeoutError::Disconnected) => {
                bail!("download worker for {} exited without a result", dl.url)
            }
        }
    }

    chmod(&target, dl.permissions)?;
    let owner = ownership(ctx, &dl.owner_string, dl.owner, dl.group)
        .with_context(|| format!("failed resolving owner of {}", target.display()))?;
    chown(&target, owner)
}

/// An existing directory receives the file under the URL's last path segment.
fn target_path(path: &Path, url: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let parsed = Url::parse(url).with_context(|| format!("invalid URL {url}"))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("cannot derive a file name from {url}"))?;
    Ok(path.join(name))
}

fn transfer(url: &str, dest: &Path, timeout: Duration, counter: &AtomicU64) -> Result<()> {
    let agent = fetch::agent(timeout);
    let mut reader = fetch::open(&agent, url, RETRY_COUNT, RETRY_DELAY)?;

    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".bootconf-download-")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

    let mut buf = vec![0_u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).context("failed reading response body")?;
        if n == 0 {
            break;
        }
        let chunk = buf.get(..n).unwrap_or_default();
        tmp.write_all(chunk)
            .with_context(|| format!("failed writing {}", dest.display()))?;
        counter.fetch_add(u64::try_from(n).unwrap_or_default(), Ordering::Relaxed);
    }

    tmp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to move download into {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt as _;

    use super::*;
    use crate::plugins::test_context;

    fn source_file(dir: &Path, content: &str) -> String {
        let src = dir.join("tool.sh");
        fs::write(&src, content).unwrap();
        Url::from_file_path(&src).unwrap().to_string()
    }

    #[test]
    fn downloads_to_file_with_mode() {
        let (ctx, tmp) = test_context();
        let src_dir = tempfile::tempdir().unwrap();
        let url = source_file(src_dir.path(), "#!/bin/sh\necho hi\n");
        let step = Step {
            downloads: vec![Download {
                url,
                path: "/installer".to_string(),
                permissions: 0o755,
                ..Download::default()
            }],
            ..Step::default()
        };

        Downloads.run(&step, &ctx).unwrap();

        let target = tmp.path().join("installer");
        assert_eq!(fs::read_to_string(&target).unwrap(), "#!/bin/sh\necho hi\n");
        assert_eq!(fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o755);
    }

    #[test]
    fn directory_target_uses_url_file_name() {
        let (ctx, tmp) = test_context();
        fs::create_dir(tmp.path().join("bin")).unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let url = source_file(src_dir.path(), "x");
        let step = Step {
            downloads: vec![Download {
                url,
                path: "/bin".to_string(),
                permissions: 0o644,
                ..Download::default()
            }],
            ..Step::default()
        };
        Downloads.run(&step, &ctx).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("bin/tool.sh")).unwrap(), "x");
    }

    #[test]
    fn failed_transfer_leaves_no_file() {
        let (ctx, tmp) = test_context();
        let step = Step {
            downloads: vec![Download {
                url: "file:///definitely/not/here".to_string(),
                path: "/out".to_string(),
                ..Download::default()
            }],
            ..Step::default()
        };
        let err = Downloads.run(&step, &ctx).unwrap_err();
        assert!(err.to_string().contains("failed to download"));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn target_path_needs_a_file_name_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(target_path(dir.path(), "https://example.com/").is_err());
        assert_eq!(
            target_path(&dir.path().join("f"), "https://example.com/").unwrap(),
            dir.path().join("f")
        );
    }
}
