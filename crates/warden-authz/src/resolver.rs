//! Effective permissions: `User → Group → Rules → {resource, action}`.

use tracing::{debug, warn};
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{PermissionEntry, PermissionSet};
use warden_core::models::rule::Rule;
use warden_core::models::user::User;
use warden_core::repository::GroupRepository;

use crate::membership::MembershipResolver;

/// Computes a user's effective permissions from storage.
///
/// Nothing is cached here; every call reads the current group and rule
/// set.
#[derive(Clone)]
pub struct PermissionResolver<G: GroupRepository> {
    membership: MembershipResolver<G>,
}

impl<G: GroupRepository> PermissionResolver<G> {
    pub fn new(groups: G) -> Self {
        Self {
            membership: MembershipResolver::new(groups),
        }
    }

    pub fn membership(&self) -> &MembershipResolver<G> {
        &self.membership
    }

    /// Empty for users without a group, with a missing group or with an
    /// inactive group.
    pub async fn resolve_permissions(&self, user: &User) -> WardenResult<PermissionSet> {
        let rules = self.granted_rules(user).await?;
        Ok(rules.iter().map(Rule::permission).collect())
    }

    /// Client payload: one entry per granted rule, sorted by resource then
    /// action.
    pub async fn resolve_entries(&self, user: &User) -> WardenResult<Vec<PermissionEntry>> {
        let mut entries: Vec<PermissionEntry> = self
            .granted_rules(user)
            .await?
            .iter()
            .map(Rule::entry)
            .collect();
        entries.sort_by(|a, b| {
            a.resource
                .cmp(&b.resource)
                .then_with(|| a.action.cmp(&b.action))
        });
        Ok(entries)
    }

    async fn granted_rules(&self, user: &User) -> WardenResult<Vec<Rule>> {
        let Some(group) = self.membership.resolve_group(user).await? else {
            debug!(user_id = %user.id, "No group, no permissions");
            return Ok(Vec::new());
        };

        if !group.is_active {
            debug!(user_id = %user.id, group_id = %group.id, "Group inactive, no permissions");
            return Ok(Vec::new());
        }

        match self.membership.groups().get_rules(group.id).await {
            Ok(rules) => Ok(rules),
            // Deleted between the two reads.
            Err(WardenError::NotFound { .. }) => {
                warn!(user_id = %user.id, group_id = %group.id, "Group vanished during resolution");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
