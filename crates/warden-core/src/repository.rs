//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Mutations that touch more than one
//! record (rule-set sync, cascading deletes) must be applied atomically by
//! implementations: either fully or not at all.

use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    group::{CreateGroup, Group, GroupDetail, GroupSummary, UpdateGroup},
    permission::Action,
    rule::{CreateRule, Rule, RuleDetail, RuleSummary, UpdateRule},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Listing filter for rules. `search` matches name, resource, action or
/// description, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub search: Option<String>,
}

/// Listing filter for groups. `search` matches name or description,
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule registry
// ---------------------------------------------------------------------------

pub trait RuleRepository: Send + Sync {
    /// Fails with `DuplicateRule` when the name or the `(resource, action)`
    /// pair is already taken.
    fn create(&self, input: CreateRule) -> impl Future<Output = WardenResult<Rule>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Rule>> + Send;
    fn get_by_resource_action(
        &self,
        resource: &str,
        action: Action,
    ) -> impl Future<Output = WardenResult<Rule>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateRule,
    ) -> impl Future<Output = WardenResult<Rule>> + Send;
    /// Deletes the rule and detaches it from every group in one step.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        filter: RuleFilter,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<RuleSummary>>> + Send;
    /// The rule together with every group that holds it.
    fn get_detail(&self, id: Uuid) -> impl Future<Output = WardenResult<RuleDetail>> + Send;
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    /// Fails with `DuplicateGroup` on a name collision and `UnknownRule` if
    /// any of `rule_ids` does not exist. Nothing is written on failure.
    fn create(&self, input: CreateGroup) -> impl Future<Output = WardenResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Group>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = WardenResult<Group>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = WardenResult<Group>> + Send;
    /// Fails with `GroupInUse` while any user references the group.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    /// Flip `is_active`. Users are not touched.
    fn toggle_active(&self, id: Uuid) -> impl Future<Output = WardenResult<Group>> + Send;
    fn list(
        &self,
        filter: GroupFilter,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<GroupSummary>>> + Send;
    fn get_detail(&self, id: Uuid) -> impl Future<Output = WardenResult<GroupDetail>> + Send;

    /// Replace the group's rule set with exactly `rule_ids` (full sync, not
    /// a merge). Idempotent.
    fn set_rules(
        &self,
        id: Uuid,
        rule_ids: Vec<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Current rules of the group, ordered by resource then action.
    fn get_rules(&self, id: Uuid) -> impl Future<Output = WardenResult<Vec<Rule>>> + Send;

    /// Number of users referencing the group.
    fn count_users(&self, id: Uuid) -> impl Future<Output = WardenResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = WardenResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    /// Point the user at a group, or clear the reference with `None`.
    fn assign_group(
        &self,
        id: Uuid,
        group_id: Option<Uuid>,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    /// Hard delete. The user's group is not affected.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<User>>> + Send;
    fn list_by_group(&self, group_id: Uuid)
    -> impl Future<Output = WardenResult<Vec<User>>> + Send;
}
