//! SurrealDB implementation of [`UserRepository`].
//!
//! A user's group is stored as a plain UUID string (`group_id`), not as a
//! record link: deleting a group must never cascade into its users, and a
//! dangling reference is tolerated by the resolver.

use chrono::{DateTime, Utc};
use tracing::debug;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::user::{CreateUser, UpdateUser, User};
use warden_core::repository::{PaginatedResult, Pagination, UserRepository};

use super::{CountRow, GROUP_MISSING, parse_uuid, retry_on_conflict, violates_index};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    name: String,
    email: String,
    group_id: Option<String>,
    is_active: bool,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct UserRowWithId {
    record_id: String,
    name: String,
    email: String,
    group_id: Option<String>,
    is_active: bool,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Statements aborting the transaction unless `$group_id` names a group.
/// The group record is touched so that a concurrent delete of it conflicts.
fn group_guard() -> String {
    format!(
        "IF count((SELECT VALUE id FROM type::record('group', $group_id))) = 0 {{ \
             THROW '{GROUP_MISSING}' \
         }}; \
         UPDATE type::record('group', $group_id) SET updated_at = time::now(); "
    )
}

fn parse_group_ref(value: Option<&str>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(v, "group")).transpose()
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            name: self.name,
            email: self.email,
            group_id: parse_group_ref(self.group_id.as_deref())?,
            is_active: self.is_active,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            name: self.name,
            email: self.email,
            group_id: parse_group_ref(self.group_id.as_deref())?,
            is_active: self.is_active,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> WardenResult<()> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE email = $email AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("email", email.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        if CountRow::total_of(&rows) > 0 {
            return Err(WardenError::AlreadyExists {
                entity: format!("user with email {email}"),
            });
        }
        Ok(())
    }

    /// Map a failed guarded write onto the domain error it stands for.
    fn write_error(message: String, email: Option<&str>, group_id: Option<Uuid>) -> WardenError {
        if let Some(group_id) = group_id
            && message.contains(GROUP_MISSING)
        {
            return DbError::NotFound {
                entity: "group".into(),
                id: group_id.to_string(),
            }
            .into();
        }
        if let Some(email) = email
            && violates_index(&message, "idx_user_email")
        {
            return WardenError::AlreadyExists {
                entity: format!("user with email {email}"),
            };
        }
        DbError::Query(message).into()
    }

    async fn create_once(&self, id: Uuid, input: &CreateUser) -> WardenResult<()> {
        let mut query = String::from("BEGIN TRANSACTION; ");
        if input.group_id.is_some() {
            query.push_str(&group_guard());
        }
        query.push_str(
            "CREATE type::record('user', $id) SET \
             name = $name, email = $email, \
             group_id = $group_id, is_active = $is_active, \
             role = $role; \
             COMMIT TRANSACTION;",
        );

        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("email", input.email.clone()))
            .bind(("group_id", input.group_id.map(|g| g.to_string())))
            .bind(("is_active", input.is_active))
            .bind(("role", input.role.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| {
                Self::write_error(e.to_string(), Some(input.email.as_str()), input.group_id)
            })?;
        Ok(())
    }

    async fn assign_once(&self, id: Uuid, group_id: Option<Uuid>) -> WardenResult<()> {
        let mut query = String::from("BEGIN TRANSACTION; ");
        if group_id.is_some() {
            query.push_str(&group_guard());
        }
        query.push_str(
            "UPDATE type::record('user', $id) SET \
             group_id = $group_id, updated_at = time::now(); \
             COMMIT TRANSACTION;",
        );

        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("group_id", group_id.map(|g| g.to_string())))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| Self::write_error(e.to_string(), None, group_id))?;
        Ok(())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> WardenResult<User> {
        self.ensure_email_free(&input.email, None).await?;

        let id = Uuid::new_v4();
        let pending = &input;
        retry_on_conflict(move || self.create_once(id, pending)).await?;

        debug!(user_id = %id, group_id = ?input.group_id, "User created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_email(&self, email: &str) -> WardenResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: email.to_string(),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        let id_str = id.to_string();

        if let Some(ref email) = input.email {
            self.ensure_email_free(email, Some(id)).await?;
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        let email = input.email;
        if let Some(ref email) = email {
            builder = builder.bind(("email", email.clone()));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| Self::write_error(e.to_string(), email.as_deref(), None))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn assign_group(&self, id: Uuid, group_id: Option<Uuid>) -> WardenResult<User> {
        self.get_by_id(id).await?;

        retry_on_conflict(move || self.assign_once(id, group_id)).await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.get_by_id(id).await?;

        self.db
            .query("DELETE type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total_of(&count_rows);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_group(&self, group_id: Uuid) -> WardenResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE group_id = $group_id ORDER BY name ASC",
            )
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let users = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_reference_parsing() {
        assert_eq!(parse_group_ref(None).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_group_ref(Some(&id.to_string())).unwrap(), Some(id));
        assert!(matches!(
            parse_group_ref(Some("not-a-uuid")),
            Err(DbError::Decode(_))
        ));
    }
}
