//! SurrealDB repository implementations.

mod group;
mod rule;
mod user;

pub use group::SurrealGroupRepository;
pub use rule::SurrealRuleRepository;
pub use user::SurrealUserRepository;

use std::future::Future;

use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};

use crate::error::DbError;

/// `THROW` payload of a group delete that still has members; the member
/// count follows the colon.
pub(crate) const GROUP_IN_USE: &str = "group_in_use:";

/// `THROW` payload of a write that names a group which no longer exists.
pub(crate) const GROUP_MISSING: &str = "group_missing";

/// Attempts made by [`retry_on_conflict`] before giving up.
const MAX_ATTEMPTS: u32 = 5;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

impl CountRow {
    /// `count() ... GROUP ALL` yields no row at all for an empty match.
    pub(crate) fn total_of(rows: &[CountRow]) -> u64 {
        rows.first().map(|r| r.total).unwrap_or(0)
    }
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

/// Lowercased search term, or `None` when blank.
pub(crate) fn search_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Whether a failed query lost a commit race against another transaction.
pub(crate) fn is_conflict(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("conflict") || message.contains("can be retried")
}

/// Whether a failed query was rejected by the UNIQUE index `index`.
pub(crate) fn violates_index(message: &str, index: &str) -> bool {
    message.contains(index) && message.contains("already contains")
}

/// Member count carried by a [`GROUP_IN_USE`] payload.
pub(crate) fn group_in_use_count(message: &str) -> Option<u64> {
    let (_, rest) = message.split_once(GROUP_IN_USE)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Re-run `op` while it fails with a commit conflict.
pub(crate) async fn retry_on_conflict<T, F, Fut>(mut op: F) -> WardenResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WardenResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(WardenError::Database(message))
                if attempt < MAX_ATTEMPTS && is_conflict(&message) =>
            {
                debug!(attempt, %message, "Transaction conflict, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}
