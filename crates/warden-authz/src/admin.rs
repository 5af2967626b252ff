//! Administrative mutations of rules, groups and user assignments.
//!
//! Each mutation is delegated to storage and, once it succeeded, the
//! permission cache is invalidated: everything for rule and group changes,
//! a single user for user changes.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::group::{CreateGroup, Group, UpdateGroup};
use warden_core::models::rule::{CreateRule, Rule, UpdateRule};
use warden_core::models::user::{CreateUser, UpdateUser, User};
use warden_core::repository::{GroupRepository, RuleRepository, UserRepository};

use crate::cache::PermissionCache;

const MAX_NAME_LEN: usize = 255;

fn validate_name(field: &str, value: &str) -> WardenResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WardenError::Validation {
            message: format!("{field} must not be empty"),
        });
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(WardenError::Validation {
            message: format!("{field} must be at most {MAX_NAME_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> WardenResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(WardenError::Validation {
            message: format!("invalid email address: {email}"),
        }),
    }
}

pub struct AdminService<R: RuleRepository, G: GroupRepository, U: UserRepository> {
    rules: R,
    groups: G,
    users: U,
    cache: Arc<PermissionCache>,
}

impl<R: RuleRepository, G: GroupRepository, U: UserRepository> AdminService<R, G, U> {
    pub fn new(rules: R, groups: G, users: U, cache: Arc<PermissionCache>) -> Self {
        Self {
            rules,
            groups,
            users,
            cache,
        }
    }

    // -- Rules -------------------------------------------------------------

    pub async fn create_rule(&self, input: CreateRule) -> WardenResult<Rule> {
        validate_name("rule name", &input.name)?;
        validate_name("resource", &input.resource)?;

        let rule = self.rules.create(input).await?;
        self.cache.invalidate_all().await;
        info!(rule_id = %rule.id, permission = %rule.permission(), "Rule created");
        Ok(rule)
    }

    pub async fn update_rule(&self, id: Uuid, input: UpdateRule) -> WardenResult<Rule> {
        if let Some(ref name) = input.name {
            validate_name("rule name", name)?;
        }

        let rule = self.rules.update(id, input).await?;
        self.cache.invalidate_all().await;
        info!(rule_id = %id, "Rule updated");
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: Uuid) -> WardenResult<()> {
        self.rules.delete(id).await?;
        self.cache.invalidate_all().await;
        info!(rule_id = %id, "Rule deleted");
        Ok(())
    }

    // -- Groups ------------------------------------------------------------

    pub async fn create_group(&self, input: CreateGroup) -> WardenResult<Group> {
        validate_name("group name", &input.name)?;

        let group = self.groups.create(input).await?;
        self.cache.invalidate_all().await;
        info!(group_id = %group.id, name = %group.name, "Group created");
        Ok(group)
    }

    pub async fn update_group(&self, id: Uuid, input: UpdateGroup) -> WardenResult<Group> {
        if let Some(ref name) = input.name {
            validate_name("group name", name)?;
        }

        let group = self.groups.update(id, input).await?;
        self.cache.invalidate_all().await;
        info!(group_id = %id, "Group updated");
        Ok(group)
    }

    pub async fn set_group_rules(&self, id: Uuid, rule_ids: Vec<Uuid>) -> WardenResult<()> {
        let count = rule_ids.len();
        self.groups.set_rules(id, rule_ids).await?;
        self.cache.invalidate_all().await;
        info!(group_id = %id, rules = count, "Group rules synced");
        Ok(())
    }

    pub async fn toggle_group_active(&self, id: Uuid) -> WardenResult<Group> {
        let group = self.groups.toggle_active(id).await?;
        self.cache.invalidate_all().await;
        info!(group_id = %id, is_active = group.is_active, "Group status toggled");
        Ok(group)
    }

    pub async fn delete_group(&self, id: Uuid) -> WardenResult<()> {
        self.groups.delete(id).await?;
        self.cache.invalidate_all().await;
        info!(group_id = %id, "Group deleted");
        Ok(())
    }

    // -- Users -------------------------------------------------------------

    pub async fn create_user(&self, input: CreateUser) -> WardenResult<User> {
        validate_name("user name", &input.name)?;
        validate_email(&input.email)?;

        let user = self.users.create(input).await?;
        info!(user_id = %user.id, group_id = ?user.group_id, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        if let Some(ref name) = input.name {
            validate_name("user name", name)?;
        }
        if let Some(ref email) = input.email {
            validate_email(email)?;
        }

        let user = self.users.update(id, input).await?;
        self.cache.invalidate_user(id).await;
        info!(user_id = %id, "User updated");
        Ok(user)
    }

    /// Move the user to `group_id`, or clear the assignment with `None`.
    pub async fn assign_user_group(&self, id: Uuid, group_id: Option<Uuid>) -> WardenResult<User> {
        let user = self.users.assign_group(id, group_id).await?;
        self.cache.invalidate_user(id).await;
        info!(user_id = %id, group_id = ?group_id, "User group assigned");
        Ok(user)
    }

    pub async fn delete_user(&self, id: Uuid) -> WardenResult<()> {
        self.users.delete(id).await?;
        self.cache.invalidate_user(id).await;
        info!(user_id = %id, "User deleted");
        Ok(())
    }
}
