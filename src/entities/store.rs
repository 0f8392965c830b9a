//! In-memory collection of entities keyed by kind and identity.
use std::collections::BTreeMap;
use std::path::Path;

use super::{Entity, EntityError, GShadow, Group, Shadow, User, database};

/// Four maps of entities, one per database kind.
///
/// Holds either a desired state aggregated from entity documents or a
/// snapshot of the live databases.  Built fresh for each comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitiesStore {
    /// `passwd` records by username.
    pub users: BTreeMap<String, User>,
    /// `group` records by group name.
    pub groups: BTreeMap<String, Group>,
    /// `shadow` records by username.
    pub shadows: BTreeMap<String, Shadow>,
    /// `gshadow` records by group name.
    pub gshadows: BTreeMap<String, GShadow>,
}

impl EntitiesStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entity`, replacing any previous entity with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::EmptyKey`] if the entity has no identity key.
    pub fn add(&mut self, entity: Entity) -> Result<(), EntityError> {
        if entity.key().is_empty() {
            return Err(EntityError::EmptyKey(entity.kind()));
        }
        match entity {
            Entity::User(u) => {
                self.users.insert(u.username.clone(), u);
            }
            Entity::Group(g) => {
                self.groups.insert(g.name.clone(), g);
            }
            Entity::Shadow(s) => {
                self.shadows.insert(s.username.clone(), s);
            }
            Entity::GShadow(g) => {
                self.gshadows.insert(g.name.clone(), g);
            }
        }
        Ok(())
    }

    /// Add every entity document (`*.yml`, `*.yaml`) directly inside `dir`.
    ///
    /// Subdirectories are not visited.  Documents that fail to parse are
    /// skipped with a debug message.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::Io`] if `dir` cannot be listed.
    pub fn load(&mut self, dir: &Path) -> Result<(), EntityError> {
        let mut paths = std::fs::read_dir(dir)
            .map_err(|e| EntityError::io(dir, e))?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| !p.is_dir() && is_entity_document(p))
            .collect::<Vec<_>>();
        paths.sort();

        for path in paths {
            match Entity::from_file(&path).and_then(|e| self.add(e)) {
                Ok(()) => {}
                Err(e) => tracing::debug!("skipping {}: {e}", path.display()),
            }
        }
        Ok(())
    }

    /// Snapshot the four live databases.
    ///
    /// Empty paths fall back to each kind's default location.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the four files cannot be read.
    pub fn from_databases(
        passwd: &Path,
        group: &Path,
        shadow: &Path,
        gshadow: &Path,
    ) -> Result<Self, EntityError> {
        Ok(Self {
            users: database::parse_file::<User>(passwd)?,
            groups: database::parse_file::<Group>(group)?,
            shadows: database::parse_file::<Shadow>(shadow)?,
            gshadows: database::parse_file::<GShadow>(gshadow)?,
        })
    }

    /// Total number of entities across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len() + self.shadows.len() + self.gshadows.len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_entity_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yml" || e == "yaml")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn add_rejects_empty_key() {
        let mut store = EntitiesStore::new();
        let err = store.add(Entity::User(User::default())).unwrap_err();
        assert!(matches!(err, EntityError::EmptyKey(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn load_reads_documents_and_ignores_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("foo.yaml"),
            "kind: group\ngroup_name: foo\ngid: 1\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("bar.yml"),
            "kind: user\nusername: bar\nuid: 5\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.yaml"), "kind: [").unwrap();
        fs::write(dir.path().join("notes.txt"), "kind: user\nusername: x\n").unwrap();
        fs::create_dir(dir.path().join("nested.yaml")).unwrap();
        fs::write(
            dir.path().join("nested.yaml").join("deep.yaml"),
            "kind: user\nusername: deep\n",
        )
        .unwrap();

        let mut store = EntitiesStore::new();
        store.load(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.groups.contains_key("foo"));
        assert_eq!(store.users["bar"].uid, 5);
    }

    #[test]
    fn load_missing_dir_fails() {
        let mut store = EntitiesStore::new();
        assert!(store.load(Path::new("/nonexistent/specs")).is_err());
    }

    #[test]
    fn from_databases_reads_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let store = EntitiesStore::from_databases(
            &p("passwd", "root:x:0:0:root:/root:/bin/bash\n"),
            &p("group", "root:x:0:\nwheel:x:10:root\n"),
            &p("shadow", "root:*:19000:0:99999:7:::\n"),
            &p("gshadow", "wheel:!::root\n"),
        )
        .unwrap();
        assert_eq!(store.users.len(), 1);
        assert_eq!(store.groups.len(), 2);
        assert_eq!(store.shadows["root"].maximum_changed, "99999");
        assert_eq!(store.gshadows["wheel"].members, "root");
    }
}
