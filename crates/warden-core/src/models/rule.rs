//! Rule domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::permission::{Action, Permission, PermissionEntry};

/// An atomic permission unit identified by `(resource, action)`.
///
/// The `(resource, action)` pair is unique across all rules and cannot be
/// changed after creation; only `name` and `description` are mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: Action,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn permission(&self) -> Permission {
        Permission::new(self.resource.clone(), self.action)
    }

    pub fn entry(&self) -> PermissionEntry {
        PermissionEntry {
            resource: self.resource.clone(),
            action: self.action,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRule {
    pub name: String,
    pub resource: String,
    pub action: Action,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRule {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
}

/// A rule as shown in listings, with the number of groups holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    #[serde(flatten)]
    pub rule: Rule,
    pub groups_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDetail {
    #[serde(flatten)]
    pub rule: Rule,
    pub groups: Vec<Group>,
}
