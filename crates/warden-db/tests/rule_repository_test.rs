//! Integration tests for the Rule repository using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use warden_core::error::WardenError;
use warden_core::models::group::CreateGroup;
use warden_core::models::permission::Action;
use warden_core::models::rule::{CreateRule, UpdateRule};
use warden_core::repository::{GroupRepository, Pagination, RuleFilter, RuleRepository};
use warden_db::repository::{SurrealGroupRepository, SurrealRuleRepository};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    db
}

fn new_rule(name: &str, resource: &str, action: Action) -> CreateRule {
    CreateRule {
        name: name.into(),
        resource: resource.into(),
        action,
        description: None,
    }
}

#[tokio::test]
async fn create_and_get_rule() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    let rule = repo
        .create(CreateRule {
            description: Some("Can view users list".into()),
            ..new_rule("Read Users", "users", Action::Read)
        })
        .await
        .unwrap();

    assert_eq!(rule.resource, "users");
    assert_eq!(rule.action, Action::Read);

    let fetched = repo.get_by_id(rule.id).await.unwrap();
    assert_eq!(fetched.name, "Read Users");
    assert_eq!(fetched.description.as_deref(), Some("Can view users list"));

    let by_pair = repo
        .get_by_resource_action("users", Action::Read)
        .await
        .unwrap();
    assert_eq!(by_pair.id, rule.id);
}

#[tokio::test]
async fn duplicate_resource_action_is_rejected() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    repo.create(new_rule("Read Users", "users", Action::Read))
        .await
        .unwrap();

    let err = repo
        .create(new_rule("List Users", "users", Action::Read))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::DuplicateRule { .. }), "{err:?}");

    let all = repo
        .list(RuleFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 1);
}

#[tokio::test]
async fn concurrent_creates_of_same_pair_report_duplicate() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    let (first, second) = tokio::join!(
        repo.create(new_rule("Read Users", "users", Action::Read)),
        repo.create(new_rule("View Users", "users", Action::Read)),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(err, WardenError::DuplicateRule { .. }), "{err:?}");

    let page = repo
        .list(RuleFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn duplicate_name_is_rejected() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    repo.create(new_rule("Users", "users", Action::Read))
        .await
        .unwrap();
    let err = repo
        .create(new_rule("Users", "users", Action::Update))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::DuplicateRule { .. }));
}

#[tokio::test]
async fn update_changes_only_name_and_description() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    let rule = repo
        .create(new_rule("Read Users", "users", Action::Read))
        .await
        .unwrap();

    let updated = repo
        .update(
            rule.id,
            UpdateRule {
                name: Some("View Users".into()),
                description: Some(Some("List and open users".into())),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "View Users");
    assert_eq!(updated.description.as_deref(), Some("List and open users"));
    assert_eq!(updated.resource, "users");
    assert_eq!(updated.action, Action::Read);

    let cleared = repo
        .update(
            rule.id,
            UpdateRule {
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.name, "View Users");
}

#[tokio::test]
async fn update_missing_rule_is_not_found() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    let err = repo
        .update(uuid::Uuid::new_v4(), UpdateRule::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn delete_detaches_rule_from_groups() {
    let db = setup().await;
    let rules = SurrealRuleRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db);

    let read = rules
        .create(new_rule("Read Users", "users", Action::Read))
        .await
        .unwrap();
    let delete = rules
        .create(new_rule("Delete Users", "users", Action::Delete))
        .await
        .unwrap();

    let ops = groups
        .create(CreateGroup {
            rule_ids: vec![read.id, delete.id],
            ..CreateGroup::named("Ops")
        })
        .await
        .unwrap();

    rules.delete(delete.id).await.unwrap();

    let remaining = groups.get_rules(ops.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, read.id);

    let err = rules.get_by_id(delete.id).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));

    let err = rules.delete(delete.id).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));
}

#[tokio::test]
async fn list_orders_by_resource_then_action_and_searches() {
    let db = setup().await;
    let repo = SurrealRuleRepository::new(db);

    repo.create(new_rule("Read Users", "users", Action::Read))
        .await
        .unwrap();
    repo.create(new_rule("Create Users", "users", Action::Create))
        .await
        .unwrap();
    repo.create(new_rule("View Dashboard", "dashboard", Action::Read))
        .await
        .unwrap();

    let all = repo
        .list(RuleFilter::default(), Pagination::default())
        .await
        .unwrap();
    let names: Vec<&str> = all.items.iter().map(|r| r.rule.name.as_str()).collect();
    assert_eq!(names, vec!["View Dashboard", "Create Users", "Read Users"]);
    assert!(all.items.iter().all(|r| r.groups_count == 0));

    let found = repo
        .list(
            RuleFilter {
                search: Some("USERS".into()),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.total, 2);

    let page = repo
        .list(
            RuleFilter::default(),
            Pagination {
                offset: 1,
                limit: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].rule.name, "Create Users");
}

#[tokio::test]
async fn detail_lists_holding_groups() {
    let db = setup().await;
    let rules = SurrealRuleRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db);

    let rule = rules
        .create(new_rule("View Dashboard", "dashboard", Action::Read))
        .await
        .unwrap();
    for name in ["Staff", "Admin"] {
        groups
            .create(CreateGroup {
                rule_ids: vec![rule.id],
                ..CreateGroup::named(name)
            })
            .await
            .unwrap();
    }

    let detail = rules.get_detail(rule.id).await.unwrap();
    let names: Vec<&str> = detail.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Admin", "Staff"]);

    let listed = rules
        .list(RuleFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.items[0].groups_count, 2);
}
