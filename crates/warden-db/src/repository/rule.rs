//! SurrealDB implementation of [`RuleRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::Action;
use warden_core::models::rule::{CreateRule, Rule, RuleDetail, RuleSummary, UpdateRule};
use warden_core::repository::{PaginatedResult, Pagination, RuleFilter, RuleRepository};

use super::group::GroupRowWithId;
use super::{CountRow, parse_uuid, retry_on_conflict, search_term, violates_index};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RuleRow {
    name: String,
    resource: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct RuleRowWithId {
    record_id: String,
    name: String,
    resource: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Listing row: the rule plus the number of groups holding it.
#[derive(Debug, SurrealValue)]
struct RuleSummaryRow {
    record_id: String,
    name: String,
    resource: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    groups_count: u64,
}

/// A clash that slipped past the pre-checks surfaces as a UNIQUE index
/// violation on write.
fn write_error(
    message: String,
    name: Option<&str>,
    pair: Option<(&str, Action)>,
) -> WardenError {
    if let Some((resource, action)) = pair
        && violates_index(&message, "idx_rule_resource_action")
    {
        return WardenError::DuplicateRule {
            reason: format!("{resource}:{action} is already defined"),
        };
    }
    if let Some(name) = name
        && violates_index(&message, "idx_rule_name")
    {
        return WardenError::DuplicateRule {
            reason: format!("name '{name}' is already taken"),
        };
    }
    DbError::Query(message).into()
}

fn parse_action(value: &str) -> Result<Action, DbError> {
    value
        .parse::<Action>()
        .map_err(|e| DbError::Decode(e.to_string()))
}

impl RuleRow {
    fn into_rule(self, id: Uuid) -> Result<Rule, DbError> {
        Ok(Rule {
            id,
            name: self.name,
            resource: self.resource,
            action: parse_action(&self.action)?,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RuleRowWithId {
    pub(crate) fn try_into_rule(self) -> Result<Rule, DbError> {
        Ok(Rule {
            id: parse_uuid(&self.record_id, "rule")?,
            name: self.name,
            resource: self.resource,
            action: parse_action(&self.action)?,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RuleSummaryRow {
    fn try_into_summary(self) -> Result<RuleSummary, DbError> {
        let groups_count = self.groups_count;
        let rule = RuleRowWithId {
            record_id: self.record_id,
            name: self.name,
            resource: self.resource,
            action: self.action,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .try_into_rule()?;
        Ok(RuleSummary { rule, groups_count })
    }
}

/// SurrealDB implementation of the Rule registry.
#[derive(Clone)]
pub struct SurrealRuleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRuleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Count rules with `name`, ignoring the rule `except` (for updates).
    async fn count_named(&self, name: &str, except: Option<Uuid>) -> WardenResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM rule \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total_of(&rows))
    }

    async fn insert_once(&self, id: Uuid, input: &CreateRule) -> WardenResult<()> {
        self.db
            .query(
                "CREATE type::record('rule', $id) SET \
                 name = $name, resource = $resource, \
                 action = $action, description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("resource", input.resource.clone()))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("description", input.description.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| {
                write_error(
                    e.to_string(),
                    Some(input.name.as_str()),
                    Some((input.resource.as_str(), input.action)),
                )
            })?;
        Ok(())
    }
}

impl<C: Connection> RuleRepository for SurrealRuleRepository<C> {
    async fn create(&self, input: CreateRule) -> WardenResult<Rule> {
        if self.count_named(&input.name, None).await? > 0 {
            return Err(WardenError::DuplicateRule {
                reason: format!("name '{}' is already taken", input.name),
            });
        }
        match self
            .get_by_resource_action(&input.resource, input.action)
            .await
        {
            Ok(existing) => {
                return Err(WardenError::DuplicateRule {
                    reason: format!(
                        "{}:{} is already defined by rule '{}'",
                        input.resource, input.action, existing.name
                    ),
                });
            }
            Err(WardenError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let id = Uuid::new_v4();
        let pending = &input;
        retry_on_conflict(move || self.insert_once(id, pending)).await?;

        debug!(rule_id = %id, "Rule created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Rule> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('rule', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "rule".into(),
            id: id_str,
        })?;

        Ok(row.into_rule(id)?)
    }

    async fn get_by_resource_action(&self, resource: &str, action: Action) -> WardenResult<Rule> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM rule \
                 WHERE resource = $resource AND action = $action",
            )
            .bind(("resource", resource.to_string()))
            .bind(("action", action.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "rule".into(),
            id: format!("{resource}:{action}"),
        })?;

        Ok(row.try_into_rule()?)
    }

    async fn update(&self, id: Uuid, input: UpdateRule) -> WardenResult<Rule> {
        let id_str = id.to_string();

        if let Some(ref name) = input.name
            && self.count_named(name, Some(id)).await? > 0
        {
            return Err(WardenError::DuplicateRule {
                reason: format!("name '{name}' is already taken"),
            });
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('rule', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(ref name) = input.name {
            builder = builder.bind(("name", name.clone()));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error(e.to_string(), input.name.as_deref(), None))?;

        let rows: Vec<RuleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "rule".into(),
            id: id_str,
        })?;

        Ok(row.into_rule(id)?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        // Surface NotFound before touching anything.
        self.get_by_id(id).await?;

        let id_str = id.to_string();

        // Membership edges go in the same transaction as the rule so no
        // group is left pointing at a missing record.
        let query = format!(
            "BEGIN TRANSACTION; \
             DELETE group_rule WHERE out = rule:`{id_str}`; \
             DELETE type::record('rule', $id); \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(rule_id = %id, "Rule deleted with its group memberships");
        Ok(())
    }

    async fn list(
        &self,
        filter: RuleFilter,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<RuleSummary>> {
        let search = search_term(filter.search.as_deref());
        let where_clause = if search.is_some() {
            "WHERE string::contains(string::lowercase(name), $search) \
             OR string::contains(string::lowercase(resource), $search) \
             OR string::contains(action, $search) \
             OR string::contains(string::lowercase(description ?? ''), $search)"
        } else {
            ""
        };

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM rule {where_clause} GROUP ALL"
            ))
            .bind(("search", search.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total_of(&count_rows);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, *, \
                 array::len(<-group_rule) AS groups_count FROM rule \
                 {where_clause} \
                 ORDER BY resource ASC, action ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("search", search))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleSummaryRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_summary())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn get_detail(&self, id: Uuid) -> WardenResult<RuleDetail> {
        let rule = self.get_by_id(id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE in FROM group_rule \
                     WHERE out = type::record('rule', $id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let groups = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(RuleDetail { rule, groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_violations_become_duplicate_rule() {
        let pair = "Database index `idx_rule_resource_action` already contains ['users', 'read']";
        let err = write_error(pair.into(), Some("Read Users"), Some(("users", Action::Read)));
        assert!(matches!(err, WardenError::DuplicateRule { ref reason } if reason == "users:read is already defined"));

        let name = "Database index `idx_rule_name` already contains 'Read Users'";
        let err = write_error(name.into(), Some("Read Users"), None);
        assert!(matches!(err, WardenError::DuplicateRule { .. }));

        let err = write_error("connection reset".into(), Some("Read Users"), None);
        assert!(matches!(err, WardenError::Database(_)));
    }
}
