//! Default rule and group catalog.
//!
//! [`seed_defaults`] is idempotent: rules are looked up by
//! `(resource, action)`, groups by name, and each default group's rule set
//! is re-synced to the catalog on every run.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::group::CreateGroup;
use warden_core::models::permission::Action;
use warden_core::models::rule::CreateRule;
use warden_core::repository::{GroupRepository, RuleRepository};

pub struct DefaultRule {
    pub name: &'static str,
    pub resource: &'static str,
    pub action: Action,
    pub description: &'static str,
}

/// Which catalog rules a default group receives.
pub enum RuleSelection {
    All,
    Named(&'static [&'static str]),
}

pub struct DefaultGroup {
    pub name: &'static str,
    pub description: &'static str,
    pub rules: RuleSelection,
}

const fn rule(
    name: &'static str,
    resource: &'static str,
    action: Action,
    description: &'static str,
) -> DefaultRule {
    DefaultRule {
        name,
        resource,
        action,
        description,
    }
}

pub static DEFAULT_RULES: &[DefaultRule] = &[
    rule("Create Users", "users", Action::Create, "Can create new users"),
    rule("Read Users", "users", Action::Read, "Can view users list"),
    rule("Update Users", "users", Action::Update, "Can edit user information"),
    rule("Delete Users", "users", Action::Delete, "Can delete users"),
    rule("Create Groups", "groups", Action::Create, "Can create new groups"),
    rule("Read Groups", "groups", Action::Read, "Can view groups list"),
    rule("Update Groups", "groups", Action::Update, "Can edit group information"),
    rule("Delete Groups", "groups", Action::Delete, "Can delete groups"),
    rule("Create Rules", "rules", Action::Create, "Can create new rules"),
    rule("Read Rules", "rules", Action::Read, "Can view rules list"),
    rule("Update Rules", "rules", Action::Update, "Can edit rule information"),
    rule("Delete Rules", "rules", Action::Delete, "Can delete rules"),
    rule("View Dashboard", "dashboard", Action::Read, "Can access dashboard"),
];

pub static DEFAULT_GROUPS: &[DefaultGroup] = &[
    DefaultGroup {
        name: "Super Admin",
        description: "Full access to all features",
        rules: RuleSelection::All,
    },
    DefaultGroup {
        name: "Admin",
        description: "Administrative access",
        rules: RuleSelection::Named(&[
            "Read Users",
            "Create Users",
            "Update Users",
            "Read Groups",
            "Read Rules",
            "View Dashboard",
        ]),
    },
    DefaultGroup {
        name: "Manager",
        description: "Can manage users",
        rules: RuleSelection::Named(&[
            "Read Users",
            "Create Users",
            "Update Users",
            "View Dashboard",
        ]),
    },
    DefaultGroup {
        name: "User",
        description: "Basic user access",
        rules: RuleSelection::Named(&["View Dashboard"]),
    },
];

/// What a seeding run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub rules_created: usize,
    pub groups_created: usize,
    pub groups_synced: usize,
}

/// Ensure the default rules and groups exist.
///
/// Existing rules keep their current name and description; existing groups
/// keep their metadata but have their rule set replaced by the catalog's.
pub async fn seed_defaults<R, G>(rules: &R, groups: &G) -> WardenResult<SeedReport>
where
    R: RuleRepository,
    G: GroupRepository,
{
    let mut report = SeedReport::default();
    let mut by_name: HashMap<&'static str, Uuid> = HashMap::new();

    for default in DEFAULT_RULES {
        let id = match rules
            .get_by_resource_action(default.resource, default.action)
            .await
        {
            Ok(existing) => existing.id,
            Err(WardenError::NotFound { .. }) => {
                let created = rules
                    .create(CreateRule {
                        name: default.name.to_string(),
                        resource: default.resource.to_string(),
                        action: default.action,
                        description: Some(default.description.to_string()),
                    })
                    .await?;
                report.rules_created += 1;
                created.id
            }
            Err(e) => return Err(e),
        };
        by_name.insert(default.name, id);
    }

    for default in DEFAULT_GROUPS {
        let rule_ids = match default.rules {
            RuleSelection::All => DEFAULT_RULES
                .iter()
                .filter_map(|r| by_name.get(r.name).copied())
                .collect(),
            RuleSelection::Named(names) => names
                .iter()
                .map(|name| {
                    by_name
                        .get(name)
                        .copied()
                        .ok_or_else(|| WardenError::Internal(format!("unknown seed rule {name}")))
                })
                .collect::<WardenResult<Vec<_>>>()?,
        };

        let group_id = match groups.get_by_name(default.name).await {
            Ok(existing) => existing.id,
            Err(WardenError::NotFound { .. }) => {
                let created = groups
                    .create(CreateGroup {
                        name: default.name.to_string(),
                        description: Some(default.description.to_string()),
                        is_active: true,
                        rule_ids: Vec::new(),
                    })
                    .await?;
                report.groups_created += 1;
                created.id
            }
            Err(e) => return Err(e),
        };

        groups.set_rules(group_id, rule_ids).await?;
        report.groups_synced += 1;
    }

    info!(
        rules_created = report.rules_created,
        groups_created = report.groups_created,
        groups_synced = report.groups_synced,
        "Default groups and rules seeded"
    );
    Ok(report)
}
