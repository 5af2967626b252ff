//! SurrealDB implementation of [`GroupRepository`].
//!
//! A group's rule set lives in `group_rule` relation edges
//! (`group -> group_rule -> rule`). Every write that touches edges runs in a
//! single transaction together with the group record itself.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::group::{CreateGroup, Group, GroupDetail, GroupSummary, UpdateGroup};
use warden_core::models::rule::Rule;
use warden_core::repository::{GroupFilter, GroupRepository, PaginatedResult, Pagination};

use super::rule::RuleRowWithId;
use super::user::UserRowWithId;
use super::{
    CountRow, GROUP_IN_USE, group_in_use_count, is_conflict, parse_uuid, retry_on_conflict,
    search_term, violates_index,
};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct GroupRowWithId {
    record_id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GroupListRow {
    record_id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    rules_count: u64,
}

/// Per-group user tally from `GROUP BY group_id`.
#[derive(Debug, SurrealValue)]
struct UsersPerGroupRow {
    group_id: String,
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> Group {
        Group {
            id,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl GroupRowWithId {
    pub(crate) fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl GroupListRow {
    fn try_into_summary(self, users: &HashMap<String, u64>) -> Result<GroupSummary, DbError> {
        let users_count = users.get(&self.record_id).copied().unwrap_or(0);
        Ok(GroupSummary {
            group: Group {
                id: parse_uuid(&self.record_id, "group")?,
                name: self.name,
                description: self.description,
                is_active: self.is_active,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            users_count,
            rules_count: self.rules_count,
        })
    }
}

/// Drop repeated ids, keeping first-seen order.
fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Statements replacing the edges of `group_id` with exactly `rule_ids`.
fn sync_statements(group_id: &str, rule_ids: &[Uuid]) -> String {
    let mut query = format!("DELETE group_rule WHERE in = group:`{group_id}`; ");
    for rule_id in rule_ids {
        query.push_str(&format!(
            "RELATE group:`{group_id}` -> group_rule -> rule:`{rule_id}`; "
        ));
    }
    query
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Count groups with `name`, ignoring the group `except` (for updates).
    async fn count_named(&self, name: &str, except: Option<Uuid>) -> WardenResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total_of(&rows))
    }

    /// Fail with `UnknownRule` naming the first id that has no rule record.
    async fn ensure_rules_exist(&self, rule_ids: &[Uuid]) -> WardenResult<()> {
        if rule_ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = rule_ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM rule WHERE meta::id(id) IN $ids")
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let found: HashSet<String> = rows.into_iter().map(|r| r.record_id).collect();

        match rule_ids.iter().find(|id| !found.contains(&id.to_string())) {
            Some(missing) => Err(WardenError::UnknownRule {
                id: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// A name clash that slipped past [`ensure_name_free`](Self::ensure_name_free)
    /// surfaces as a UNIQUE index violation.
    fn write_error(message: String, name: Option<&str>) -> WardenError {
        match name {
            Some(name) if violates_index(&message, "idx_group_name") => {
                WardenError::DuplicateGroup {
                    name: name.to_string(),
                }
            }
            _ => DbError::Query(message).into(),
        }
    }

    /// Create the record and its rule edges in one transaction.
    async fn insert_once(
        &self,
        id: Uuid,
        input: &CreateGroup,
        rule_ids: &[Uuid],
    ) -> WardenResult<()> {
        let id_str = id.to_string();

        let mut query = String::from(
            "BEGIN TRANSACTION; \
             CREATE type::record('group', $id) SET \
             name = $name, description = $description, is_active = $is_active; ",
        );
        for rule_id in rule_ids {
            query.push_str(&format!(
                "RELATE group:`{id_str}` -> group_rule -> rule:`{rule_id}`; "
            ));
        }
        query.push_str("COMMIT TRANSACTION;");

        self.db
            .query(query)
            .bind(("id", id_str))
            .bind(("name", input.name.clone()))
            .bind(("description", input.description.clone()))
            .bind(("is_active", input.is_active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| Self::write_error(e.to_string(), Some(input.name.as_str())))?;
        Ok(())
    }

    /// One attempt at deleting the group. The member count is read inside
    /// the transaction that removes the record.
    async fn delete_once(&self, id: Uuid) -> WardenResult<()> {
        let id_str = id.to_string();

        let query = format!(
            "BEGIN TRANSACTION; \
             IF count((SELECT VALUE id FROM user WHERE group_id = $id)) > 0 {{ \
                 THROW string::concat( \
                     '{GROUP_IN_USE}', \
                     count((SELECT VALUE id FROM user WHERE group_id = $id)) \
                 ) \
             }}; \
             DELETE group_rule WHERE in = group:`{id_str}`; \
             DELETE type::record('group', $id); \
             COMMIT TRANSACTION;"
        );

        let outcome = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?
            .check();

        match outcome {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if let Some(users) = group_in_use_count(&message) {
                    return Err(WardenError::GroupInUse { id: id_str, users });
                }
                if is_conflict(&message) {
                    return Err(DbError::Query(message).into());
                }
                // The abort may be reported on another statement of the block.
                match self.count_users(id).await? {
                    0 => Err(DbError::Query(message).into()),
                    users => Err(WardenError::GroupInUse { id: id_str, users }),
                }
            }
        }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> WardenResult<()> {
        if self.count_named(name, except).await? > 0 {
            return Err(WardenError::DuplicateGroup {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> WardenResult<Group> {
        self.ensure_name_free(&input.name, None).await?;
        let rule_ids = dedup_ids(input.rule_ids.clone());
        self.ensure_rules_exist(&rule_ids).await?;

        let id = Uuid::new_v4();
        let pending = &input;
        let rules = &rule_ids;
        retry_on_conflict(move || self.insert_once(id, pending, rules)).await?;

        debug!(group_id = %id, rules = rule_ids.len(), "Group created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id))
    }

    async fn get_by_name(&self, name: &str) -> WardenResult<Group> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM group WHERE name = $name")
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: name.to_string(),
        })?;

        Ok(row.try_into_group()?)
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> WardenResult<Group> {
        self.get_by_id(id).await?;
        if let Some(ref name) = input.name {
            self.ensure_name_free(name, Some(id)).await?;
        }
        let rule_ids = input.rule_ids.map(dedup_ids);
        if let Some(ref ids) = rule_ids {
            self.ensure_rules_exist(ids).await?;
        }

        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let mut query = format!(
            "BEGIN TRANSACTION; UPDATE type::record('group', $id) SET {}; ",
            sets.join(", ")
        );
        if let Some(ref ids) = rule_ids {
            query.push_str(&sync_statements(&id_str, ids));
        }
        query.push_str("COMMIT TRANSACTION;");

        let mut builder = self.db.query(query).bind(("id", id_str));

        if let Some(ref name) = input.name {
            builder = builder.bind(("name", name.clone()));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| Self::write_error(e.to_string(), input.name.as_deref()))?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.get_by_id(id).await?;

        retry_on_conflict(move || self.delete_once(id)).await?;

        debug!(group_id = %id, "Group deleted");
        Ok(())
    }

    async fn toggle_active(&self, id: Uuid) -> WardenResult<Group> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('group', $id) SET \
                 is_active = !is_active, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id))
    }

    async fn list(
        &self,
        filter: GroupFilter,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<GroupSummary>> {
        let search = search_term(filter.search.as_deref());
        let where_clause = if search.is_some() {
            "WHERE string::contains(string::lowercase(name), $search) \
             OR string::contains(string::lowercase(description ?? ''), $search)"
        } else {
            ""
        };

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM group {where_clause} GROUP ALL"
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
                 array::len(->group_rule) AS rules_count FROM group \
                 {where_clause} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset; \
                 SELECT group_id, count() AS total FROM user \
                 WHERE group_id != NONE GROUP BY group_id;"
            ))
            .bind(("search", search))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupListRow> = result.take(0).map_err(DbError::from)?;
        let per_group: Vec<UsersPerGroupRow> = result.take(1).map_err(DbError::from)?;
        let users: HashMap<String, u64> = per_group
            .into_iter()
            .map(|r| (r.group_id, r.total))
            .collect();

        let items = rows
            .into_iter()
            .map(|row| row.try_into_summary(&users))
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn get_detail(&self, id: Uuid) -> WardenResult<GroupDetail> {
        let group = self.get_by_id(id).await?;
        let rules = self.get_rules(id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE group_id = $id ORDER BY name ASC",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let users = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(GroupDetail {
            group,
            rules,
            users,
        })
    }

    async fn set_rules(&self, id: Uuid, rule_ids: Vec<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        let rule_ids = dedup_ids(rule_ids);
        self.ensure_rules_exist(&rule_ids).await?;

        let id_str = id.to_string();
        let query = format!(
            "BEGIN TRANSACTION; {} \
             UPDATE type::record('group', $id) SET updated_at = time::now(); \
             COMMIT TRANSACTION;",
            sync_statements(&id_str, &rule_ids)
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(group_id = %id, rules = rule_ids.len(), "Group rules synced");
        Ok(())
    }

    async fn get_rules(&self, id: Uuid) -> WardenResult<Vec<Rule>> {
        self.get_by_id(id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM rule \
                 WHERE id IN (\
                     SELECT VALUE out FROM group_rule \
                     WHERE in = type::record('group', $id)\
                 ) \
                 ORDER BY resource ASC, action ASC",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RuleRowWithId> = result.take(0).map_err(DbError::from)?;

        let rules = rows
            .into_iter()
            .map(|row| row.try_into_rule())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(rules)
    }

    async fn count_users(&self, id: Uuid) -> WardenResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM user WHERE group_id = $id GROUP ALL")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total_of(&rows))
    }
}
