//! Authorization configuration.

/// Configuration for the permission cache and request guard.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Serve session permission payloads from [`PermissionCache`]
    /// (default: true). The request guard never reads the cache.
    ///
    /// [`PermissionCache`]: crate::cache::PermissionCache
    pub cache_enabled: bool,
    /// Upper bound on cached users (default: 10_000).
    pub cache_max_entries: usize,
    /// Deny every request from a user whose `is_active` flag is cleared
    /// (default: true).
    pub deny_inactive_users: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_entries: 10_000,
            deny_inactive_users: true,
        }
    }
}
