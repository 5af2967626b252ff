//! Request guard run before privileged operations.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::access::{AccessRequest, can_perform};
use warden_core::error::WardenResult;
use warden_core::models::permission::{Action, PermissionEntry};
use warden_core::models::user::User;
use warden_core::repository::{GroupRepository, UserRepository};

use crate::cache::PermissionCache;
use crate::config::AuthzConfig;
use crate::error::AuthzError;
use crate::resolver::PermissionResolver;

/// Authorizes requests against freshly resolved permissions.
///
/// [`authorize`](Self::authorize) never consults the cache: a permission
/// revoked a moment ago is already enforced. The cache only backs the
/// session payload sent to the dashboard.
pub struct AccessGuard<U: UserRepository, G: GroupRepository> {
    users: U,
    resolver: PermissionResolver<G>,
    cache: Arc<PermissionCache>,
    config: AuthzConfig,
}

impl<U: UserRepository, G: GroupRepository> AccessGuard<U, G> {
    pub fn new(users: U, groups: G, cache: Arc<PermissionCache>, config: AuthzConfig) -> Self {
        Self {
            users,
            resolver: PermissionResolver::new(groups),
            cache,
            config,
        }
    }

    pub fn resolver(&self) -> &PermissionResolver<G> {
        &self.resolver
    }

    /// `Ok(())` iff the user may perform `action` on `resource`; otherwise
    /// `AuthorizationDenied`.
    pub async fn authorize(&self, user_id: Uuid, resource: &str, action: Action) -> WardenResult<()> {
        self.authorize_request(user_id, &AccessRequest::single(resource, action))
            .await
    }

    /// Allowed when any of the requested actions is allowed.
    pub async fn authorize_request(
        &self,
        user_id: Uuid,
        request: &AccessRequest,
    ) -> WardenResult<()> {
        let user = self.load_user(user_id).await?;
        let permissions = self.resolver.resolve_permissions(&user).await?;

        if can_perform(&permissions, request) {
            debug!(user_id = %user_id, request = %request, "Access granted");
            return Ok(());
        }

        warn!(user_id = %user_id, request = %request, "Access denied");
        Err(AuthzError::Forbidden(request.to_string()).into())
    }

    /// Legacy `"resource:action1|action2"` form. Malformed input denies.
    pub async fn authorize_str(&self, user_id: Uuid, spec: &str) -> WardenResult<()> {
        match AccessRequest::parse_lenient(spec) {
            Some(request) => self.authorize_request(user_id, &request).await,
            None => Err(AuthzError::MalformedRequest(spec.to_string()).into()),
        }
    }

    /// Permission payload for the dashboard session, served from the cache
    /// when enabled. Inactive users receive an empty list.
    pub async fn session_permissions(&self, user_id: Uuid) -> WardenResult<Vec<PermissionEntry>> {
        if self.config.cache_enabled
            && let Some(cached) = self.cache.get(user_id).await
        {
            return Ok(cached);
        }

        let generation = self.cache.generation().await;
        let user = self.users.get_by_id(user_id).await?;
        let entries = if user.is_active || !self.config.deny_inactive_users {
            self.resolver.resolve_entries(&user).await?
        } else {
            Vec::new()
        };

        if self.config.cache_enabled {
            self.cache.insert(user_id, entries.clone(), generation).await;
        }
        Ok(entries)
    }

    async fn load_user(&self, user_id: Uuid) -> WardenResult<User> {
        let user = self.users.get_by_id(user_id).await?;
        if !user.is_active && self.config.deny_inactive_users {
            warn!(user_id = %user_id, "Inactive user denied");
            return Err(AuthzError::InactiveUser(user_id).into());
        }
        Ok(user)
    }
}
