//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. Record ids are UUIDs; the
//! user's group reference is stored as the group's UUID string. Actions
//! are stored as lowercase strings with an ASSERT constraint. Uniqueness
//! (rule name, rule resource+action, group name, user email, group/rule
//! pair) is enforced by UNIQUE indexes in addition to the repository
//! pre-checks.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — rules, groups, users and the group/rule relation
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Rules: (resource, action) pairs that can be granted
-- =======================================================================
DEFINE TABLE rule SCHEMAFULL;
DEFINE FIELD name ON TABLE rule TYPE string;
DEFINE FIELD resource ON TABLE rule TYPE string;
DEFINE FIELD action ON TABLE rule TYPE string \
    ASSERT $value IN ['create', 'read', 'update', 'delete', 'manage'];
DEFINE FIELD description ON TABLE rule TYPE option<string>;
DEFINE FIELD created_at ON TABLE rule TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_rule_name ON TABLE rule COLUMNS name UNIQUE;
DEFINE INDEX idx_rule_resource_action ON TABLE rule \
    COLUMNS resource, action UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE option<string>;
DEFINE FIELD is_active ON TABLE group TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- =======================================================================
-- Users (group_id is a nullable reference to a group record id)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD group_id ON TABLE user TYPE option<string>;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD role ON TABLE user TYPE string DEFAULT 'user';
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_group ON TABLE user COLUMNS group_id;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- Group -> Rule membership
DEFINE TABLE group_rule TYPE RELATION SCHEMAFULL;
DEFINE FIELD created_at ON TABLE group_rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_rule_pair ON TABLE group_rule \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Apply every migration newer than the recorded schema version.
///
/// The `_migration` tracking table is created on first use. Returns the
/// number of migrations applied by this call (zero when up to date).
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = current_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        info!(version = current, "Schema is up to date");
        return Ok(0);
    }

    for migration in &pending {
        apply(db, migration).await?;
    }

    Ok(pending.len())
}

async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );

    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}': {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("recording v{}: {e}", migration.version))
        })?;

    info!(version = migration.version, "Migration applied");
    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
