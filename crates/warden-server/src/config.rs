//! Server configuration sourced from `WARDEN_*` environment variables.

use anyhow::{Context, Result};
use warden_db::DbConfig;

const DEFAULT_LOG_FILTER: &str = "warden_server=info,warden_db=info,warden_authz=info";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    /// Create the default rules and groups on startup.
    pub seed_defaults: bool,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DbConfig::default();
        let db = DbConfig {
            url: lookup("WARDEN_DB_URL").unwrap_or(defaults.url),
            namespace: lookup("WARDEN_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: lookup("WARDEN_DB_DATABASE").unwrap_or(defaults.database),
            username: lookup("WARDEN_DB_USER").unwrap_or(defaults.username),
            password: lookup("WARDEN_DB_PASSWORD").unwrap_or(defaults.password),
        };
        let seed_defaults = match lookup("WARDEN_SEED_DEFAULTS") {
            Some(value) => parse_bool(&value).with_context(|| "parse WARDEN_SEED_DEFAULTS")?,
            None => true,
        };
        let log_filter = lookup("WARDEN_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Ok(Self {
            db,
            seed_defaults,
            log_filter,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db.url, "127.0.0.1:8000");
        assert_eq!(config.db.namespace, "warden");
        assert!(config.seed_defaults);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("WARDEN_DB_URL", "db:8000"),
            ("WARDEN_DB_DATABASE", "acl"),
            ("WARDEN_SEED_DEFAULTS", "off"),
            ("WARDEN_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.db.url, "db:8000");
        assert_eq!(config.db.database, "acl");
        assert!(!config.seed_defaults);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn invalid_bool_is_an_error() {
        let err = ServerConfig::from_lookup(lookup_from(&[("WARDEN_SEED_DEFAULTS", "maybe")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("WARDEN_SEED_DEFAULTS"));
    }
}
