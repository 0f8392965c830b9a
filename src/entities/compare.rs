//! One-directional comparison of a desired-state store against the live system.
//!
//! Every entity in the desired store is looked up in the live store.  Live
//! entities with no desired counterpart are never reported.
use serde::Serialize;

use super::{EntitiesStore, Entity, EntityKind, GShadow, Group, Shadow, User};

/// One entity whose live state does not match its desired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDifference {
    /// Database kind.
    pub kind: EntityKind,
    /// Identity key.
    pub name: String,
    /// `true` when the entity is absent from the live system.
    pub missing: bool,
    /// Human-readable summary.
    pub description: String,
    /// The live entity, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Entity>,
    /// The desired entity.
    pub target: Entity,
}

fn user_differs(want: &User, have: &User) -> bool {
    (want.uid >= 0 && have.uid != want.uid)
        || (want.group.is_empty() && have.gid != want.gid)
        || have.homedir != want.homedir
        || have.shell != want.shell
}

fn group_differs(want: &Group, have: &Group) -> bool {
    have.password != want.password
        || (want.gid.is_some_and(|g| g >= 0) && have.gid != want.gid)
        || have.users != want.users
}

fn shadow_differs(want: &Shadow, have: &Shadow) -> bool {
    have.minimum_changed != want.minimum_changed
        || have.maximum_changed != want.maximum_changed
        || have.warn != want.warn
        || have.inactive != want.inactive
        || have.expire != want.expire
}

fn gshadow_differs(want: &GShadow, have: &GShadow) -> bool {
    have.password != want.password
        || have.administrators != want.administrators
        || have.members != want.members
}

/// Compare `desired` against `live`.
///
/// Results are grouped by kind (users, groups, shadows, gshadows) and sorted
/// by key within each kind.
#[must_use]
pub fn compare(desired: &EntitiesStore, live: &EntitiesStore) -> Vec<EntityDifference> {
    let mut out = Vec::new();

    for (name, want) in &desired.users {
        diff_one(
            &mut out,
            name,
            Entity::User(want.clone()),
            live.users.get(name).map(|have| {
                (
                    Entity::User(have.clone()),
                    user_differs(want, have),
                )
            }),
            &format!("User {name} is not present."),
            &format!("User {name} has difference."),
        );
    }
    for (name, want) in &desired.groups {
        diff_one(
            &mut out,
            name,
            Entity::Group(want.clone()),
            live.groups.get(name).map(|have| {
                (
                    Entity::Group(have.clone()),
                    group_differs(want, have),
                )
            }),
            &format!("Group {name} is not present."),
            &format!("Group {name} has difference."),
        );
    }
    for (name, want) in &desired.shadows {
        diff_one(
            &mut out,
            name,
            Entity::Shadow(want.clone()),
            live.shadows.get(name).map(|have| {
                (
                    Entity::Shadow(have.clone()),
                    shadow_differs(want, have),
                )
            }),
            &format!("Shadow with username {name} is not present."),
            &format!("Shadow with user {name} has difference."),
        );
    }
    for (name, want) in &desired.gshadows {
        diff_one(
            &mut out,
            name,
            Entity::GShadow(want.clone()),
            live.gshadows.get(name).map(|have| {
                (
                    Entity::GShadow(have.clone()),
                    gshadow_differs(want, have),
                )
            }),
            &format!("GShadow with name {name} is not present."),
            &format!("GShadow with name {name} has difference."),
        );
    }

    out
}

fn diff_one(
    out: &mut Vec<EntityDifference>,
    name: &str,
    target: Entity,
    live: Option<(Entity, bool)>,
    missing_text: &str,
    differs_text: &str,
) {
    match live {
        None => out.push(EntityDifference {
            kind: target.kind(),
            name: name.to_string(),
            missing: true,
            description: missing_text.to_string(),
            original: None,
            target,
        }),
        Some((original, true)) => out.push(EntityDifference {
            kind: target.kind(),
            name: name.to_string(),
            missing: false,
            description: differs_text.to_string(),
            original: Some(original),
            target,
        }),
        Some((_, false)) => {}
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn user(name: &str, uid: i64, gid: i64, shell: &str) -> User {
        User {
            username: name.to_string(),
            password: "x".to_string(),
            uid,
            gid,
            shell: shell.to_string(),
            homedir: format!("/home/{name}"),
            ..User::default()
        }
    }

    fn store_with_users(users: &[User]) -> EntitiesStore {
        let mut store = EntitiesStore::new();
        for u in users {
            store.add(Entity::User(u.clone())).unwrap();
        }
        store
    }

    #[test]
    fn identical_stores_have_no_difference() {
        let s = store_with_users(&[user("a", 1000, 1000, "/bin/sh")]);
        assert!(compare(&s, &s).is_empty());
    }

    #[test]
    fn missing_entity_is_reported() {
        let desired = store_with_users(&[user("a", 1000, 1000, "/bin/sh")]);
        let diffs = compare(&desired, &EntitiesStore::new());
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].missing);
        assert_eq!(diffs[0].description, "User a is not present.");
        assert!(diffs[0].original.is_none());
    }

    #[test]
    fn live_only_entities_are_never_reported() {
        let live = store_with_users(&[user("extra", 1, 1, "/bin/sh")]);
        assert!(compare(&EntitiesStore::new(), &live).is_empty());
    }

    #[test]
    fn shell_change_is_a_difference() {
        let desired = store_with_users(&[user("a", 1000, 1000, "/bin/zsh")]);
        let live = store_with_users(&[user("a", 1000, 1000, "/bin/sh")]);
        let diffs = compare(&desired, &live);
        assert_eq!(diffs.len(), 1);
        assert!(!diffs[0].missing);
        assert_eq!(diffs[0].description, "User a has difference.");
        assert!(diffs[0].original.is_some());
    }

    #[test]
    fn dynamic_uid_and_named_group_are_not_compared() {
        let mut want = user("a", -1, 0, "/bin/sh");
        want.group = "users".to_string();
        let desired = store_with_users(&[want]);
        let live = store_with_users(&[user("a", 612, 100, "/bin/sh")]);
        assert!(compare(&desired, &live).is_empty());
    }

    #[test]
    fn password_is_not_compared_for_users() {
        let mut want = user("a", 1, 1, "/bin/sh");
        want.password = "changed".to_string();
        let desired = store_with_users(&[want]);
        let live = store_with_users(&[user("a", 1, 1, "/bin/sh")]);
        assert!(compare(&desired, &live).is_empty());
    }

    #[test]
    fn unset_group_gid_is_not_compared() {
        let g = |gid| Group {
            name: "g".to_string(),
            password: "x".to_string(),
            gid,
            users: "a".to_string(),
        };
        let mut desired = EntitiesStore::new();
        desired.add(Entity::Group(g(None))).unwrap();
        let mut live = EntitiesStore::new();
        live.add(Entity::Group(g(Some(42)))).unwrap();
        assert!(compare(&desired, &live).is_empty());

        let mut desired = EntitiesStore::new();
        desired.add(Entity::Group(g(Some(7)))).unwrap();
        assert_eq!(compare(&desired, &live).len(), 1);
    }

    #[test]
    fn shadow_compares_aging_fields_only() {
        let s = |password: &str, expire: &str| Shadow {
            username: "a".to_string(),
            password: password.to_string(),
            expire: expire.to_string(),
            ..Shadow::default()
        };
        let mut desired = EntitiesStore::new();
        desired.add(Entity::Shadow(s("$6$new", ""))).unwrap();
        let mut live = EntitiesStore::new();
        live.add(Entity::Shadow(s("$6$old", ""))).unwrap();
        assert!(compare(&desired, &live).is_empty());

        let mut desired = EntitiesStore::new();
        desired.add(Entity::Shadow(s("$6$old", "100"))).unwrap();
        let diffs = compare(&desired, &live);
        assert_eq!(diffs[0].description, "Shadow with user a has difference.");
    }

    #[test]
    fn gshadow_missing_description() {
        let mut desired = EntitiesStore::new();
        desired
            .add(Entity::GShadow(GShadow {
                name: "wheel".to_string(),
                ..GShadow::default()
            }))
            .unwrap();
        let diffs = compare(&desired, &EntitiesStore::new());
        assert_eq!(diffs[0].kind, EntityKind::GShadow);
        assert_eq!(diffs[0].description, "GShadow with name wheel is not present.");
    }
}
