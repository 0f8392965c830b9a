//! Filesystem helpers shared by the file-producing plugins.
use std::fs;
use std::os::unix::fs::PermissionsExt as _;
use std::path::Path;

use anyhow::{Context as _, Result};
use nix::unistd::{Gid, Uid};

use crate::entities::database::parse_file;
use crate::entities::{Group, Record as _, User};
use crate::error::PluginError;

use super::Context;

/// Numeric owner and group to apply; `None` leaves the current value.
pub type Ownership = (Option<u32>, Option<u32>);

/// Resolve an `owner_string` of the form `user[:group]`.
///
/// Names are looked up in the passwd and group databases below the
/// context's filesystem root; numeric ids are taken as-is.  Without a group
/// the user's primary gid is used.
///
/// # Errors
///
/// Returns [`PluginError::UnknownOwner`] when a name is not in its database,
/// or the database read error.
pub fn resolve_owner(ctx: &Context, owner_string: &str) -> Result<Ownership> {
    let (user, group) = owner_string
        .split_once(':')
        .map_or((owner_string, None), |(u, g)| (u, Some(g)));

    let (uid, primary_gid) = if let Ok(uid) = user.parse::<u32>() {
        (uid, None)
    } else {
        let users = parse_file::<User>(&ctx.fs.resolve(&User::default_path()))?;
        let entry = users
            .get(user)
            .ok_or_else(|| PluginError::UnknownOwner(owner_string.to_string()))?;
        (to_id(entry.uid, owner_string)?, Some(to_id(entry.gid, owner_string)?))
    };

    let gid = match group.filter(|g| !g.is_empty()) {
        None => primary_gid,
        Some(g) => match g.parse::<u32>() {
            Ok(gid) => Some(gid),
            Err(_) => {
                let groups = parse_file::<Group>(&ctx.fs.resolve(&Group::default_path()))?;
                let gid = groups
                    .get(g)
                    .and_then(|entry| entry.gid)
                    .ok_or_else(|| PluginError::UnknownOwner(owner_string.to_string()))?;
                Some(to_id(gid, owner_string)?)
            }
        },
    };
    Ok((Some(uid), gid))
}

fn to_id(id: i64, owner_string: &str) -> Result<u32> {
    u32::try_from(id).map_err(|_| PluginError::UnknownOwner(owner_string.to_string()).into())
}

/// The owner string when set, otherwise the numeric fields.
///
/// # Errors
///
/// See [`resolve_owner`].
pub fn ownership(
    ctx: &Context,
    owner_string: &str,
    owner: Option<u32>,
    group: Option<u32>,
) -> Result<Ownership> {
    if owner_string.is_empty() {
        Ok((owner, group))
    } else {
        resolve_owner(ctx, owner_string)
    }
}

/// Set the mode bits of `path`.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn chmod(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:o} {}", mode, path.display()))
}

/// Change ownership of `path`; a no-op when neither id is set.
///
/// # Errors
///
/// Returns an error if the ownership cannot be changed.
pub fn chown(path: &Path, (uid, gid): Ownership) -> Result<()> {
    if uid.is_none() && gid.is_none() {
        return Ok(());
    }
    nix::unistd::chown(path, uid.map(Uid::from_raw), gid.map(Gid::from_raw)).with_context(|| {
        format!(
            "chown {}:{} {}",
            uid.map_or_else(String::new, |u| u.to_string()),
            gid.map_or_else(String::new, |g| g.to_string()),
            path.display()
        )
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::plugins::context::test_context;

    fn rooted_with_databases() -> (Context, tempfile::TempDir) {
        let (ctx, tmp) = test_context();
        let etc = tmp.path().join("etc");
        fs::create_dir_all(&etc).unwrap();
        fs::write(
            etc.join("passwd"),
            "root:x:0:0:root:/root:/bin/sh\nops:x:1500:1600::/home/ops:/bin/sh\n",
        )
        .unwrap();
        fs::write(etc.join("group"), "root:x:0:\nwheel:x:10:ops\n").unwrap();
        (ctx, tmp)
    }

    #[test]
    fn user_only_uses_primary_group() {
        let (ctx, _tmp) = rooted_with_databases();
        assert_eq!(resolve_owner(&ctx, "ops").unwrap(), (Some(1500), Some(1600)));
    }

    #[test]
    fn named_group_overrides_primary_group() {
        let (ctx, _tmp) = rooted_with_databases();
        assert_eq!(
            resolve_owner(&ctx, "ops:wheel").unwrap(),
            (Some(1500), Some(10))
        );
    }

    #[test]
    fn numeric_ids_skip_lookup() {
        let (ctx, _tmp) = test_context();
        assert_eq!(resolve_owner(&ctx, "33:44").unwrap(), (Some(33), Some(44)));
        assert_eq!(resolve_owner(&ctx, "33").unwrap(), (Some(33), None));
    }

    #[test]
    fn unknown_names_are_errors() {
        let (ctx, _tmp) = rooted_with_databases();
        let err = resolve_owner(&ctx, "nobody").unwrap_err();
        assert!(err.to_string().contains("unknown owner 'nobody'"));
        assert!(resolve_owner(&ctx, "ops:nogroup").is_err());
    }

    #[test]
    fn chown_to_current_owner_succeeds() {
        use std::os::unix::fs::MetadataExt as _;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("owned");
        fs::write(&path, "x").unwrap();
        let meta = fs::metadata(&path).unwrap();
        chown(&path, (Some(meta.uid()), Some(meta.gid()))).unwrap();
        assert!(chown(&tmp.path().join("missing"), (Some(meta.uid()), None)).is_err());
    }

    #[test]
    fn chown_without_ids_is_noop() {
        chown(Path::new("/definitely/missing"), (None, None)).unwrap();
    }
}
