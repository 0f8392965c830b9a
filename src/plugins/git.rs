//! Clones or updates the step's `git` checkout.
use std::path::Path;

use anyhow::{Context as _, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use git2::build::RepoBuilder;
use git2::{
    CertificateCheckStatus, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository,
    ResetType,
};

use crate::config::{Git, GitAuth, Step};

use super::{Context, Plugin};

const DEFAULT_BRANCH: &str = "master";
const DEFAULT_SSH_USER: &str = "git";

/// Clones `url` into `path`, or force-updates an existing checkout.
///
/// An existing checkout is fetched and hard-reset to the remote branch, so
/// local changes are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCheckout;

impl Plugin for GitCheckout {
    fn name(&self) -> &'static str {
        "git"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let git = &step.git;
        if git.url.is_empty() {
            return Ok(());
        }
        let path = ctx.resolve(&git.path);
        if path.join(".git").exists() {
            ctx.log
                .info(&format!("repository {} already exists, updating it", git.path));
            update(git, &path)
        } else {
            ctx.log.info(&format!("cloning git repository '{}'", git.url));
            clone(git, &path)
        }
    }
}

fn clone(git: &Git, path: &Path) -> Result<()> {
    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options(&git.auth));
    if !git.branch.is_empty() {
        builder.branch(&git.branch);
    }
    if git.branch_only {
        let branch = branch_or_default(git, None);
        builder.remote_create(move |repo, name, url| {
            repo.remote_with_fetch(
                name,
                url,
                &format!("+refs/heads/{branch}:refs/remotes/{name}/{branch}"),
            )
        });
    }
    builder
        .clone(&git.url, path)
        .with_context(|| format!("failed cloning {}", git.url))?;
    Ok(())
}

fn update(git: &Git, path: &Path) -> Result<()> {
    let repo = Repository::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let current = repo
        .head()
        .ok()
        .and_then(|h| h.shorthand().map(str::to_string));
    let branch = branch_or_default(git, current.as_deref());

    let mut remote = repo
        .find_remote("origin")
        .context("checkout has no 'origin' remote")?;
    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    remote
        .fetch(&[refspec.as_str()], Some(&mut fetch_options(&git.auth)), None)
        .with_context(|| format!("failed fetching {}", git.url))?;

    let target = repo
        .revparse_single(&format!("refs/remotes/origin/{branch}"))
        .with_context(|| format!("branch '{branch}' not found on origin"))?;
    repo.reset(&target, ResetType::Hard, None)
        .with_context(|| format!("failed resetting {} to origin/{branch}", path.display()))?;
    Ok(())
}

/// The configured branch; else the checked-out one; else `master`.
fn branch_or_default(git: &Git, current: Option<&str>) -> String {
    if !git.branch.is_empty() {
        return git.branch.clone();
    }
    current
        .filter(|b| *b != "HEAD")
        .unwrap_or(DEFAULT_BRANCH)
        .to_string()
}

fn fetch_options(auth: &GitAuth) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();

    let username = auth.username.clone();
    let password = auth.password.clone();
    let private_key = auth.private_key.clone();
    callbacks.credentials(move |_url, url_user, allowed| {
        if !private_key.is_empty() && allowed.contains(CredentialType::SSH_KEY) {
            let user = if username.is_empty() {
                url_user.unwrap_or(DEFAULT_SSH_USER)
            } else {
                username.as_str()
            };
            return Cred::ssh_key_from_memory(user, None, &private_key, None);
        }
        if !username.is_empty() && allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::userpass_plaintext(&username, &password);
        }
        Cred::default()
    });

    let insecure = auth.insecure;
    let pinned = host_key(&auth.public_key);
    callbacks.certificate_check(move |cert, host| {
        if insecure {
            return Ok(CertificateCheckStatus::CertificateOk);
        }
        match (&pinned, cert.as_hostkey().and_then(|k| k.hostkey())) {
            (Some(expected), Some(actual)) if expected.as_slice() == actual => {
                Ok(CertificateCheckStatus::CertificateOk)
            }
            (Some(_), Some(_)) => Err(git2::Error::from_str(&format!(
                "host key for {host} does not match the configured public key"
            ))),
            _ => Ok(CertificateCheckStatus::CertificatePassthrough),
        }
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

/// Raw key bytes from an OpenSSH public key line (`<type> <base64> [comment]`).
fn host_key(public_key: &str) -> Option<Vec<u8>> {
    let encoded = public_key.split_whitespace().nth(1)?;
    STANDARD.decode(encoded).ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use git2::{RepositoryInitOptions, Signature};

    use super::*;
    use crate::plugins::test_context;

    fn init_origin(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        Repository::init_opts(dir, &opts).unwrap()
    }

    fn commit_file(repo: &Repository, name: &str, content: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parents)
            .unwrap();
    }

    fn git_step(url: &Path) -> Step {
        Step {
            git: Git {
                url: url.display().to_string(),
                path: "/srv/checkout".to_string(),
                ..Git::default()
            },
            ..Step::default()
        }
    }

    #[test]
    fn clones_then_updates_with_hard_reset() {
        let (ctx, tmp) = test_context();
        let origin_dir = tempfile::tempdir().unwrap();
        let origin = init_origin(origin_dir.path());
        commit_file(&origin, "app.conf", "v1\n");
        let step = git_step(origin_dir.path());
        let checkout = tmp.path().join("srv/checkout");

        GitCheckout.run(&step, &ctx).unwrap();
        assert_eq!(fs::read_to_string(checkout.join("app.conf")).unwrap(), "v1\n");

        commit_file(&origin, "app.conf", "v2\n");
        fs::write(checkout.join("app.conf"), "local edit\n").unwrap();
        GitCheckout.run(&step, &ctx).unwrap();
        assert_eq!(fs::read_to_string(checkout.join("app.conf")).unwrap(), "v2\n");
    }

    #[test]
    fn missing_branch_is_an_error() {
        let (ctx, _tmp) = test_context();
        let origin_dir = tempfile::tempdir().unwrap();
        let origin = init_origin(origin_dir.path());
        commit_file(&origin, "a", "a");
        let mut step = git_step(origin_dir.path());
        step.git.branch = "does-not-exist".to_string();
        assert!(GitCheckout.run(&step, &ctx).is_err());
    }

    #[test]
    fn empty_url_is_noop() {
        let (ctx, _tmp) = test_context();
        GitCheckout.run(&Step::default(), &ctx).unwrap();
    }

    #[test]
    fn branch_defaults() {
        let git = Git::default();
        assert_eq!(branch_or_default(&git, None), "master");
        assert_eq!(branch_or_default(&git, Some("main")), "main");
        assert_eq!(branch_or_default(&git, Some("HEAD")), "master");
        let pinned = Git {
            branch: "release".to_string(),
            ..Git::default()
        };
        assert_eq!(branch_or_default(&pinned, Some("main")), "release");
    }

    #[test]
    fn host_key_decodes_openssh_line() {
        let line = format!("ssh-ed25519 {} host", STANDARD.encode(b"key-bytes"));
        assert_eq!(host_key(&line).unwrap(), b"key-bytes");
        assert!(host_key("garbage").is_none());
    }
}
