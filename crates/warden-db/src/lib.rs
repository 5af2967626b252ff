//! Warden Database — SurrealDB connection management, schema migrations,
//! repository implementations and default seed data.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repository implementations of the `warden-core` traits
//!   ([`repository`])
//! - The default rule/group catalog ([`seed_defaults`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod seed;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use seed::{
    DEFAULT_GROUPS, DEFAULT_RULES, DefaultGroup, DefaultRule, RuleSelection, SeedReport, seed_defaults,
};
