//! Group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rule::Rule;
use super::user::User;

/// A named, activatable bundle of rules. Users are assigned to at most one
/// group, which makes the group their role.
///
/// The rule set itself is stored as `group_rule` edges and is fetched
/// separately; an inactive group grants nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub rule_ids: Vec<Uuid>,
}

fn default_active() -> bool {
    true
}

impl CreateGroup {
    /// An active group with no description and no rules.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_active: true,
            rule_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
    /// When present, replaces the whole rule set.
    pub rule_ids: Option<Vec<Uuid>>,
}

/// A group as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: Group,
    pub users_count: u64,
    pub rules_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub rules: Vec<Rule>,
    pub users: Vec<User>,
}
