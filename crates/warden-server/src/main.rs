//! Warden Server — connects to SurrealDB, applies migrations and seeds the
//! default rule/group catalog.

mod config;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_core::repository::{GroupFilter, GroupRepository, Pagination};
use warden_db::DbManager;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .with_context(|| "parse log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Warden server...");

    let manager = DbManager::connect(&config.db)
        .await
        .with_context(|| format!("connect to SurrealDB at {}", config.db.url))?;

    let applied = manager
        .migrate()
        .await
        .with_context(|| "run schema migrations")?;
    info!(applied, "Schema ready");

    let rules = manager.rules();
    let groups = manager.groups();

    if config.seed_defaults {
        warden_db::seed_defaults(&rules, &groups)
            .await
            .with_context(|| "seed default groups and rules")?;
    }

    let listing = groups
        .list(
            GroupFilter::default(),
            Pagination {
                offset: 0,
                limit: 100,
            },
        )
        .await
        .with_context(|| "list groups")?;
    for summary in &listing.items {
        info!(
            group = %summary.group.name,
            is_active = summary.group.is_active,
            rules = summary.rules_count,
            users = summary.users_count,
            "Group"
        );
    }

    info!(groups = listing.total, "Warden server ready.");
    Ok(())
}
