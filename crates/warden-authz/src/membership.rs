//! User → Group lookup.

use tracing::warn;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::group::Group;
use warden_core::models::user::User;
use warden_core::repository::GroupRepository;

/// Resolves the group a user currently belongs to.
#[derive(Clone)]
pub struct MembershipResolver<G: GroupRepository> {
    groups: G,
}

impl<G: GroupRepository> MembershipResolver<G> {
    pub fn new(groups: G) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &G {
        &self.groups
    }

    /// The user's group, or `None` when the user has no group.
    ///
    /// A reference to a group that no longer exists also yields `None`.
    /// Storage failures are propagated.
    pub async fn resolve_group(&self, user: &User) -> WardenResult<Option<Group>> {
        let Some(group_id) = user.group_id else {
            return Ok(None);
        };

        match self.groups.get_by_id(group_id).await {
            Ok(group) => Ok(Some(group)),
            Err(WardenError::NotFound { .. }) => {
                warn!(
                    user_id = %user.id,
                    group_id = %group_id,
                    "User references a missing group"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
