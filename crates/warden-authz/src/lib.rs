//! Warden Authz — group-based permission resolution, the permission cache,
//! the request guard and the cache-aware admin service.
//!
//! Every service is generic over the `warden-core` repository traits so
//! this crate has no dependency on the storage backend.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod membership;
pub mod resolver;

pub use admin::AdminService;
pub use cache::PermissionCache;
pub use config::AuthzConfig;
pub use error::AuthzError;
pub use guard::AccessGuard;
pub use membership::MembershipResolver;
pub use resolver::PermissionResolver;
