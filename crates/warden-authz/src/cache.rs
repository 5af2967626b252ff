//! Resolved-permission cache keyed by user id.
//!
//! Callers read [`PermissionCache::generation`] before resolving and hand
//! it back to [`PermissionCache::insert`]. Any invalidation in between bumps
//! the generation, and the stale insert is dropped.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use warden_core::models::permission::{PermissionEntry, PermissionSet};

use crate::config::AuthzConfig;

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<Uuid, Vec<PermissionEntry>>,
}

#[derive(Debug)]
pub struct PermissionCache {
    inner: RwLock<CacheState>,
    max_entries: usize,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::with_capacity(usize::MAX)
    }
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(CacheState::default()),
            max_entries,
        }
    }

    pub fn from_config(config: &AuthzConfig) -> Self {
        Self::with_capacity(config.cache_max_entries)
    }

    /// Current generation; pass it to [`insert`](Self::insert).
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    pub async fn get(&self, user_id: Uuid) -> Option<Vec<PermissionEntry>> {
        self.inner.read().await.entries.get(&user_id).cloned()
    }

    /// Cached permissions as a set, for evaluator calls.
    pub async fn get_set(&self, user_id: Uuid) -> Option<PermissionSet> {
        self.inner
            .read()
            .await
            .entries
            .get(&user_id)
            .map(|entries| entries.iter().collect())
    }

    /// Store `entries` computed at `generation`. Returns false (and stores
    /// nothing) when the cache was invalidated since, or when it is full.
    pub async fn insert(
        &self,
        user_id: Uuid,
        entries: Vec<PermissionEntry>,
        generation: u64,
    ) -> bool {
        let mut guard = self.inner.write().await;
        if guard.generation != generation {
            debug!(user_id = %user_id, generation, current = guard.generation, "Dropping stale permissions");
            return false;
        }
        if guard.entries.len() >= self.max_entries && !guard.entries.contains_key(&user_id) {
            debug!(user_id = %user_id, "Permission cache full");
            return false;
        }
        guard.entries.insert(user_id, entries);
        true
    }

    /// Forget one user (login, logout, group reassignment).
    pub async fn invalidate_user(&self, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard.generation += 1;
        guard.entries.remove(&user_id);
    }

    /// Forget everyone (any group or rule mutation).
    pub async fn invalidate_all(&self) {
        let mut guard = self.inner.write().await;
        guard.generation += 1;
        guard.entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
