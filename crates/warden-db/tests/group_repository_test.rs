//! Integration tests for the Group repository using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_core::error::WardenError;
use warden_core::models::group::{CreateGroup, UpdateGroup};
use warden_core::models::permission::Action;
use warden_core::models::rule::{CreateRule, Rule};
use warden_core::models::user::CreateUser;
use warden_core::repository::{
    GroupFilter, GroupRepository, Pagination, RuleRepository, UserRepository,
};
use warden_db::repository::{
    SurrealGroupRepository, SurrealRuleRepository, SurrealUserRepository,
};

struct Fixture {
    groups: SurrealGroupRepository<Db>,
    users: SurrealUserRepository<Db>,
    read_users: Rule,
    delete_users: Rule,
    read_groups: Rule,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let rules = SurrealRuleRepository::new(db.clone());
    let mut created = Vec::new();
    for (name, resource, action) in [
        ("Read Users", "users", Action::Read),
        ("Delete Users", "users", Action::Delete),
        ("Read Groups", "groups", Action::Read),
    ] {
        created.push(
            rules
                .create(CreateRule {
                    name: name.into(),
                    resource: resource.into(),
                    action,
                    description: None,
                })
                .await
                .unwrap(),
        );
    }
    let read_groups = created.pop().unwrap();
    let delete_users = created.pop().unwrap();
    let read_users = created.pop().unwrap();

    Fixture {
        groups: SurrealGroupRepository::new(db.clone()),
        users: SurrealUserRepository::new(db),
        read_users,
        delete_users,
        read_groups,
    }
}

fn member(name: &str, group_id: Option<Uuid>) -> CreateUser {
    CreateUser {
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        role: "user".into(),
        group_id,
        is_active: true,
    }
}

fn ids(rules: &[Rule]) -> Vec<Uuid> {
    rules.iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn create_group_with_rules() {
    let f = setup().await;

    let group = f
        .groups
        .create(CreateGroup {
            description: Some("Support staff".into()),
            rule_ids: vec![f.read_users.id, f.read_groups.id],
            ..CreateGroup::named("Support")
        })
        .await
        .unwrap();

    assert!(group.is_active);
    assert_eq!(group.description.as_deref(), Some("Support staff"));

    let rules = f.groups.get_rules(group.id).await.unwrap();
    // Ordered by resource, then action.
    assert_eq!(ids(&rules), vec![f.read_groups.id, f.read_users.id]);

    let by_name = f.groups.get_by_name("Support").await.unwrap();
    assert_eq!(by_name.id, group.id);
}

#[tokio::test]
async fn create_with_unknown_rule_writes_nothing() {
    let f = setup().await;
    let missing = Uuid::new_v4();

    let err = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id, missing],
            ..CreateGroup::named("Broken")
        })
        .await
        .unwrap_err();

    match err {
        WardenError::UnknownRule { id } => assert_eq!(id, missing.to_string()),
        other => panic!("expected UnknownRule, got {other:?}"),
    }
    let err = f.groups.get_by_name("Broken").await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_group_name_is_rejected() {
    let f = setup().await;
    f.groups.create(CreateGroup::named("Ops")).await.unwrap();

    let err = f.groups.create(CreateGroup::named("Ops")).await.unwrap_err();
    assert!(matches!(err, WardenError::DuplicateGroup { .. }));

    let other = f.groups.create(CreateGroup::named("Support")).await.unwrap();
    let err = f
        .groups
        .update(
            other.id,
            UpdateGroup {
                name: Some("Ops".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::DuplicateGroup { .. }));
}

#[tokio::test]
async fn set_rules_replaces_and_is_idempotent() {
    let f = setup().await;
    let group = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();

    let target = vec![f.delete_users.id, f.read_groups.id, f.delete_users.id];
    f.groups.set_rules(group.id, target.clone()).await.unwrap();
    let first = f.groups.get_rules(group.id).await.unwrap();

    f.groups.set_rules(group.id, target).await.unwrap();
    let second = f.groups.get_rules(group.id).await.unwrap();

    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), vec![f.read_groups.id, f.delete_users.id]);

    f.groups.set_rules(group.id, Vec::new()).await.unwrap();
    assert!(f.groups.get_rules(group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn set_rules_with_unknown_rule_keeps_previous_set() {
    let f = setup().await;
    let group = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();

    let err = f
        .groups
        .set_rules(group.id, vec![f.delete_users.id, Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::UnknownRule { .. }));

    let rules = f.groups.get_rules(group.id).await.unwrap();
    assert_eq!(ids(&rules), vec![f.read_users.id]);

    let err = f
        .groups
        .set_rules(Uuid::new_v4(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn update_with_rule_ids_syncs_rules() {
    let f = setup().await;
    let group = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();

    let updated = f
        .groups
        .update(
            group.id,
            UpdateGroup {
                description: Some(Some("Operations".into())),
                is_active: Some(false),
                rule_ids: Some(vec![f.read_groups.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Ops");
    assert_eq!(updated.description.as_deref(), Some("Operations"));
    assert!(!updated.is_active);
    let rules = f.groups.get_rules(group.id).await.unwrap();
    assert_eq!(ids(&rules), vec![f.read_groups.id]);

    // Without rule_ids the rule set is left alone.
    f.groups
        .update(
            group.id,
            UpdateGroup {
                name: Some("Operations".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let rules = f.groups.get_rules(group.id).await.unwrap();
    assert_eq!(ids(&rules), vec![f.read_groups.id]);
}

#[tokio::test]
async fn toggle_active_flips_state() {
    let f = setup().await;
    let group = f.groups.create(CreateGroup::named("Ops")).await.unwrap();

    let toggled = f.groups.toggle_active(group.id).await.unwrap();
    assert!(!toggled.is_active);
    let toggled = f.groups.toggle_active(group.id).await.unwrap();
    assert!(toggled.is_active);

    let err = f.groups.toggle_active(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn delete_group_in_use_is_refused_until_reassigned() {
    let f = setup().await;
    let ops = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();
    let staff = f.groups.create(CreateGroup::named("Staff")).await.unwrap();

    let bob = f.users.create(member("Bob", Some(ops.id))).await.unwrap();

    let err = f.groups.delete(ops.id).await.unwrap_err();
    match err {
        WardenError::GroupInUse { users, .. } => assert_eq!(users, 1),
        other => panic!("expected GroupInUse, got {other:?}"),
    }
    // Nothing changed.
    assert_eq!(f.groups.get_rules(ops.id).await.unwrap().len(), 1);
    assert_eq!(f.users.get_by_id(bob.id).await.unwrap().group_id, Some(ops.id));

    f.users.assign_group(bob.id, Some(staff.id)).await.unwrap();
    f.groups.delete(ops.id).await.unwrap();

    let err = f.groups.get_by_id(ops.id).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn delete_racing_assignment_never_leaves_dangling_member() {
    let f = setup().await;

    for round in 0..8 {
        let group = f
            .groups
            .create(CreateGroup::named(&format!("Transient {round}")))
            .await
            .unwrap();
        let user = f
            .users
            .create(member(&format!("Racer{round}"), None))
            .await
            .unwrap();

        let (deleted, assigned) = tokio::join!(
            f.groups.delete(group.id),
            f.users.assign_group(user.id, Some(group.id)),
        );

        let stored = f.users.get_by_id(user.id).await.unwrap();
        match (deleted, assigned) {
            (Ok(()), Err(WardenError::NotFound { entity, .. })) => {
                assert_eq!(entity, "group");
                assert_eq!(stored.group_id, None);
            }
            (Err(WardenError::GroupInUse { users, .. }), Ok(assigned)) => {
                assert_eq!(users, 1);
                assert_eq!(assigned.group_id, Some(group.id));
                assert_eq!(stored.group_id, Some(group.id));
                f.groups.get_by_id(group.id).await.unwrap();
            }
            other => panic!("exactly one of delete/assign must win, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn concurrent_creates_with_same_name_report_duplicate() {
    let f = setup().await;

    let (first, second) = tokio::join!(
        f.groups.create(CreateGroup::named("Ops")),
        f.groups.create(CreateGroup::named("Ops")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(err, WardenError::DuplicateGroup { ref name } if name == "Ops"), "{err:?}");
}

#[tokio::test]
async fn list_reports_counts_newest_first() {
    let f = setup().await;
    let first = f
        .groups
        .create(CreateGroup {
            description: Some("Front desk".into()),
            rule_ids: vec![f.read_users.id, f.read_groups.id],
            ..CreateGroup::named("Reception")
        })
        .await
        .unwrap();
    let second = f.groups.create(CreateGroup::named("Auditors")).await.unwrap();

    f.users.create(member("Ann", Some(first.id))).await.unwrap();
    f.users.create(member("Ben", Some(first.id))).await.unwrap();
    f.users.create(member("Cid", None)).await.unwrap();

    let page = f
        .groups
        .list(GroupFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].group.id, second.id);
    assert_eq!(page.items[1].group.id, first.id);
    assert_eq!(page.items[1].users_count, 2);
    assert_eq!(page.items[1].rules_count, 2);
    assert_eq!(page.items[0].users_count, 0);

    let found = f
        .groups
        .list(
            GroupFilter {
                search: Some("front".into()),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].group.name, "Reception");
}

#[tokio::test]
async fn detail_includes_rules_and_users() {
    let f = setup().await;
    let group = f
        .groups
        .create(CreateGroup {
            rule_ids: vec![f.read_users.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();
    f.users.create(member("Zed", Some(group.id))).await.unwrap();
    f.users.create(member("Amy", Some(group.id))).await.unwrap();

    let detail = f.groups.get_detail(group.id).await.unwrap();
    assert_eq!(detail.group.id, group.id);
    assert_eq!(ids(&detail.rules), vec![f.read_users.id]);
    let names: Vec<&str> = detail.users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Amy", "Zed"]);
    assert_eq!(f.groups.count_users(group.id).await.unwrap(), 2);
}
