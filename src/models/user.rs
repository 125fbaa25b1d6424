// User database model with per-account lockout state
// The lockout columns (failed_login_attempts, locked_until, last_failed_login)
// are only ever mutated under a row lock; see LockoutService.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::users;

/// Fixed role set. There is no permission tree beyond this.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, diesel::expression::AsExpression,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for UserRole
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for UserRole
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

/// User database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered for tenant")]
    EmailTaken,
}

impl User {
    /// Find user by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by (email, tenant); email comparison is case-insensitive
    pub async fn find_by_email_and_tenant(
        conn: &mut AsyncPgConnection,
        email_str: &str,
        tenant: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;
        use diesel::PgTextExpressionMethods;

        users
            .filter(email.ilike(email_str))
            .filter(tenant_id.eq(tenant))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user; duplicate (email, tenant) maps to `EmailTaken`
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::EmailTaken,
                _ => UserError::Database(e),
            })
    }

    /// List all users of a tenant
    pub async fn list_for_tenant(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
    ) -> Result<Vec<Self>, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(tenant_id.eq(tenant))
            .order(created_at.asc())
            .load::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Load the user row under a pessimistic lock. Lockout increments go
    /// through this to avoid lost updates from concurrent failed attempts.
    pub async fn find_for_update(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use diesel::sql_query;
        use diesel::sql_types::Uuid as SqlUuid;

        sql_query(
            "SELECT id, tenant_id, email, password_hash, full_name, role, \
             is_active, failed_login_attempts, locked_until, last_failed_login, \
             created_at, updated_at \
             FROM users \
             WHERE id = $1 \
             FOR UPDATE",
        )
        .bind::<SqlUuid, _>(user_id)
        .get_result::<User>(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => UserError::NotFound,
            _ => UserError::Database(e),
        })
    }

    /// Write back lockout state for a user
    pub async fn set_lockout_state(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        attempts: i32,
        locked: Option<DateTime<Utc>>,
        last_failed: Option<DateTime<Utc>>,
    ) -> Result<(), UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((
                failed_login_attempts.eq(attempts),
                locked_until.eq(locked),
                last_failed_login.eq(last_failed),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Get the role as the typed enum; unknown values are treated as USER
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid role '{}' for user {}, defaulting to USER: {}",
                self.role,
                self.id,
                e
            );
            UserRole::User
        })
    }

    /// A user is locked when locked_until is set and lies in the future
    pub fn is_locked(&self) -> bool {
        match self.locked_until {
            Some(until) => until > Utc::now(),
            None => false,
        }
    }
}
