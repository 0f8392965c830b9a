//! Read-modify-write of account database files.
//!
//! Every mutation reads the whole file, computes the new content in memory,
//! and replaces the file atomically: the new content is written to a
//! temporary file in the same directory with the original permission bits
//! and renamed over the target.  Lines the operation does not target are
//! carried over byte for byte.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::os::unix::fs::{MetadataExt as _, PermissionsExt as _};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid};

use super::{EntityError, Record};

/// Identity key of a raw database line: everything before the first `:`.
#[must_use]
pub fn identifier(line: &str) -> &str {
    line.split(':').next().unwrap_or_default()
}

/// `path`, or the kind's default database when `path` is empty.
#[must_use]
pub fn resolve_path<R: Record>(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        R::default_path()
    } else {
        path.to_path_buf()
    }
}

/// Contents and metadata of a database file captured by one read.
#[derive(Debug)]
struct Snapshot {
    path: PathBuf,
    content: String,
    metadata: fs::Metadata,
}

impl Snapshot {
    fn read(path: &Path) -> Result<Self, EntityError> {
        let metadata = fs::metadata(path).map_err(|e| EntityError::io(path, e))?;
        let content = fs::read_to_string(path).map_err(|e| EntityError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
            metadata,
        })
    }

    fn records<R: Record>(&self) -> BTreeMap<String, R> {
        parse_records(&self.content)
    }

    /// Replace the file with `content`, keeping mode and (when permitted) owner.
    fn replace(&self, content: &str) -> Result<(), EntityError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |e| EntityError::io(&self.path, e);

        let mut tmp = tempfile::Builder::new()
            .prefix(".bootconf-")
            .tempfile_in(dir)
            .map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(self.metadata.mode() & 0o7777))
            .map_err(io_err)?;
        if let Err(e) = nix::unistd::chown(
            tmp.path(),
            Some(Uid::from_raw(self.metadata.uid())),
            Some(Gid::from_raw(self.metadata.gid())),
        ) {
            tracing::debug!("keeping new owner of {}: {e}", self.path.display());
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Parse database text into records keyed by identity.  Later duplicates win.
#[must_use]
pub fn parse_records<R: Record>(content: &str) -> BTreeMap<String, R> {
    content
        .lines()
        .filter_map(R::parse_line)
        .map(|r| (r.key().to_string(), r))
        .collect()
}

/// Parse the database at `path` (the kind's default when empty).
///
/// # Errors
///
/// Returns [`EntityError::Io`] if the file cannot be stated or read.
pub fn parse_file<R: Record>(path: &Path) -> Result<BTreeMap<String, R>, EntityError> {
    let path = resolve_path::<R>(path);
    Ok(Snapshot::read(&path)?.records())
}

/// Reject keys that would split or break a database line.
fn check_key<R: Record>(record: &R) -> Result<(), EntityError> {
    if record.key().contains([':', '\n', '\r']) {
        return Err(EntityError::InvalidKey {
            kind: R::KIND,
            key: record.key().to_string(),
        });
    }
    Ok(())
}

/// Append `record` to the database at `path`.
///
/// # Errors
///
/// Returns [`EntityError::InvalidKey`] for a key containing `:` or a line
/// break, [`EntityError::AlreadyPresent`] if the key exists, or an error
/// from preparation or file I/O.
pub fn create<R: Record>(record: R, path: &Path) -> Result<(), EntityError> {
    check_key(&record)?;
    let path = resolve_path::<R>(path);
    let record = record.prepare(&path)?;
    let snapshot = Snapshot::read(&path)?;
    append(&record, &snapshot)
}

fn append<R: Record>(record: &R, snapshot: &Snapshot) -> Result<(), EntityError> {
    if snapshot.records::<R>().contains_key(record.key()) {
        return Err(EntityError::AlreadyPresent {
            kind: R::KIND,
            key: record.key().to_string(),
            path: snapshot.path.clone(),
        });
    }

    let mut content = snapshot.content.clone();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&record.to_line());
    content.push('\n');
    snapshot.replace(&content)
}

/// Remove the first line exactly equal to `record`'s serialization.
///
/// A record whose current serialization is not present leaves the file
/// untouched; that is not an error.
///
/// # Errors
///
/// Returns [`EntityError::Io`] if the file cannot be read or replaced.
pub fn delete<R: Record>(record: &R, path: &Path) -> Result<(), EntityError> {
    let path = resolve_path::<R>(path);
    let snapshot = Snapshot::read(&path)?;
    let needle = format!("{}\n", record.to_line());
    if !snapshot.content.contains(&needle) {
        tracing::debug!(
            "{} '{}' not present in {}",
            R::KIND,
            record.key(),
            path.display()
        );
        return Ok(());
    }
    snapshot.replace(&snapshot.content.replacen(&needle, "", 1))
}

/// Reconcile the database at `path` with `record`.
///
/// An existing line with the same key is rewritten in place; an absent key
/// is appended.  With `safe` set, an id held by a different key is a
/// conflict and an existing line is never rewritten.
///
/// # Errors
///
/// Returns [`EntityError::EmptyKey`] for a record without identity,
/// [`EntityError::InvalidKey`] for a key containing `:` or a line break,
/// [`EntityError::IdInUse`] for a safe-mode collision, or an error from
/// preparation or file I/O.
pub fn apply<R: Record>(record: R, path: &Path, safe: bool) -> Result<(), EntityError> {
    if record.key().is_empty() {
        return Err(EntityError::EmptyKey(R::KIND));
    }
    check_key(&record)?;
    let path = resolve_path::<R>(path);
    let record = record.prepare(&path)?;
    let snapshot = Snapshot::read(&path)?;
    let current = snapshot.records::<R>();

    if safe
        && let Some(id) = record.numeric_id()
        && let Some(owner) = current
            .values()
            .find(|r| r.numeric_id() == Some(id) && r.key() != record.key())
    {
        return Err(EntityError::IdInUse {
            kind: R::KIND,
            id,
            owner: owner.key().to_string(),
        });
    }

    if !current.contains_key(record.key()) {
        return append(&record, &snapshot);
    }
    if safe {
        return Ok(());
    }

    let line = record.to_line();
    let rewritten = snapshot
        .content
        .split('\n')
        .map(|l| if identifier(l) == record.key() { line.as_str() } else { l })
        .collect::<Vec<_>>()
        .join("\n");
    if rewritten == snapshot.content {
        return Ok(());
    }
    snapshot.replace(&rewritten)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::entities::{EntityKind, GShadow, Group, User};

    const GROUPS: &str = "nm-openconnect:x:979:\nsddm:x:978:\nopenvpn:x:977:\nntp:x:123:\n";

    fn group_file(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn group(name: &str, gid: i64, users: &str) -> Group {
        Group {
            name: name.to_string(),
            password: "xx".to_string(),
            gid: Some(gid),
            users: users.to_string(),
        }
    }

    #[test]
    fn identifier_is_first_field() {
        assert_eq!(identifier("root:x:0:0::/root:/bin/sh"), "root");
        assert_eq!(identifier(""), "");
        assert_eq!(identifier("nocolon"), "nocolon");
    }

    #[test]
    fn create_appends_line() {
        let (_dir, path) = group_file(GROUPS);
        create(group("foo", 1, "one,two,tree"), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{GROUPS}foo:xx:1:one,two,tree\n"));
    }

    #[test]
    fn create_twice_conflicts() {
        let (_dir, path) = group_file(GROUPS);
        create(group("foo", 1, ""), &path).unwrap();
        let err = create(group("foo", 1, ""), &path).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(parse_file::<Group>(&path).unwrap()["foo"], group("foo", 1, ""));
    }

    #[test]
    fn create_terminates_unterminated_last_line() {
        let (_dir, path) = group_file("ntp:x:123:");
        create(group("foo", 1, ""), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ntp:x:123:\nfoo:xx:1:\n");
    }

    #[test]
    fn create_preserves_permissions() {
        let (_dir, path) = group_file(GROUPS);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        create(group("foo", 1, ""), &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn create_on_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = create(group("foo", 1, ""), &dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_restores_original_bytes() {
        let (_dir, path) = group_file(GROUPS);
        let foo = group("foo", 1, "one,two,tree");
        apply(foo.clone(), &path, false).unwrap();
        delete(&foo, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn delete_of_stale_record_is_noop() {
        let (_dir, path) = group_file(GROUPS);
        delete(&group("sddm", 978, "stale"), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn delete_removes_only_first_occurrence() {
        let (_dir, path) = group_file("a:x:1:\na:x:1:\n");
        let a = Group {
            name: "a".to_string(),
            password: "x".to_string(),
            gid: Some(1),
            users: String::new(),
        };
        delete(&a, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a:x:1:\n");
    }

    #[test]
    fn apply_rewrites_only_matching_line() {
        let (_dir, path) = group_file(GROUPS);
        apply(group("sddm", 1, "one,two,tree"), &path, false).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "nm-openconnect:x:979:\nsddm:xx:1:one,two,tree\nopenvpn:x:977:\nntp:x:123:\n"
        );
    }

    #[test]
    fn apply_is_idempotent() {
        let (_dir, path) = group_file(GROUPS);
        apply(group("sddm", 978, "a"), &path, false).unwrap();
        let first = fs::read(&path).unwrap();
        apply(group("sddm", 978, "a"), &path, false).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn apply_preserves_blank_lines() {
        let (_dir, path) = group_file("a:x:1:\n\nb:x:2:\n");
        apply(group("b", 2, "z"), &path, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a:x:1:\n\nb:xx:2:z\n");
    }

    #[test]
    fn apply_rejects_empty_key() {
        let (_dir, path) = group_file(GROUPS);
        let err = apply(group("", 1, ""), &path, false).unwrap_err();
        assert!(matches!(err, EntityError::EmptyKey(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn separators_in_key_are_rejected() {
        let (_dir, path) = group_file(GROUPS);
        for name in ["bad:name", "bad\nname"] {
            let err = apply(group(name, 1, ""), &path, false).unwrap_err();
            assert!(matches!(err, EntityError::InvalidKey { ref key, .. } if key == name));
            let err = create(group(name, 1, ""), &path).unwrap_err();
            assert!(matches!(err, EntityError::InvalidKey { .. }));
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn safe_apply_conflicts_on_foreign_uid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passwd");
        let passwd = "root:x:0:0:root:/root:/bin/sh\nops:x:1500:1500::/home/ops:/bin/sh\n";
        fs::write(&path, passwd).unwrap();
        let user = User {
            username: "newcomer".to_string(),
            password: "x".to_string(),
            uid: 1500,
            gid: 1500,
            ..User::default()
        };

        let err = apply(user, &path, true).unwrap_err();
        assert!(matches!(
            err,
            EntityError::IdInUse { kind: EntityKind::User, id: 1500, ref owner } if owner == "ops"
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), passwd);
    }

    #[test]
    fn safe_apply_conflicts_on_foreign_id() {
        let (_dir, path) = group_file(GROUPS);
        let err = apply(group("foo", 978, ""), &path, true).unwrap_err();
        assert!(matches!(err, EntityError::IdInUse { id: 978, ref owner, .. } if owner == "sddm"));
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn safe_apply_leaves_existing_line() {
        let (_dir, path) = group_file(GROUPS);
        apply(group("sddm", 978, "changed"), &path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), GROUPS);
    }

    #[test]
    fn safe_apply_appends_absent_key() {
        let (_dir, path) = group_file(GROUPS);
        apply(group("foo", 5, ""), &path, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().ends_with("foo:xx:5:\n"));
    }

    #[test]
    fn kinds_without_ids_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gshadow");
        fs::write(&path, "mail:!::\n").unwrap();
        let entity = GShadow {
            name: "mail".to_string(),
            password: "!".to_string(),
            administrators: "root".to_string(),
            members: String::new(),
        };
        apply(entity, &path, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "mail:!:root:\n");
    }
}
