// Audit log database model
// Append-only: the application inserts and queries, never updates or deletes.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::audit_logs;

/// Closed set of security event kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, diesel::expression::AsExpression)]
#[diesel(sql_type = diesel::sql_types::Text)]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailed,
    Logout,
    PasswordChange,
    TokenRefresh,
    AccountLocked,
    AccountUnlocked,
    UserCreated,
    UserUpdated,
    UserDeleted,
    TenantCreated,
    PermissionDenied,
    SuspiciousActivity,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::LoginSuccess => "LOGIN_SUCCESS",
            AuditEventType::LoginFailed => "LOGIN_FAILED",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::PasswordChange => "PASSWORD_CHANGE",
            AuditEventType::TokenRefresh => "TOKEN_REFRESH",
            AuditEventType::AccountLocked => "ACCOUNT_LOCKED",
            AuditEventType::AccountUnlocked => "ACCOUNT_UNLOCKED",
            AuditEventType::UserCreated => "USER_CREATED",
            AuditEventType::UserUpdated => "USER_UPDATED",
            AuditEventType::UserDeleted => "USER_DELETED",
            AuditEventType::TenantCreated => "TENANT_CREATED",
            AuditEventType::PermissionDenied => "PERMISSION_DENIED",
            AuditEventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN_SUCCESS" => Ok(AuditEventType::LoginSuccess),
            "LOGIN_FAILED" => Ok(AuditEventType::LoginFailed),
            "LOGOUT" => Ok(AuditEventType::Logout),
            "PASSWORD_CHANGE" => Ok(AuditEventType::PasswordChange),
            "TOKEN_REFRESH" => Ok(AuditEventType::TokenRefresh),
            "ACCOUNT_LOCKED" => Ok(AuditEventType::AccountLocked),
            "ACCOUNT_UNLOCKED" => Ok(AuditEventType::AccountUnlocked),
            "USER_CREATED" => Ok(AuditEventType::UserCreated),
            "USER_UPDATED" => Ok(AuditEventType::UserUpdated),
            "USER_DELETED" => Ok(AuditEventType::UserDeleted),
            "TENANT_CREATED" => Ok(AuditEventType::TenantCreated),
            "PERMISSION_DENIED" => Ok(AuditEventType::PermissionDenied),
            "SUSPICIOUS_ACTIVITY" => Ok(AuditEventType::SuspiciousActivity),
            _ => Err(format!("Invalid audit event type: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for AuditEventType
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for AuditEventType
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

/// Audit log database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLog {
    pub id: Uuid,
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// New audit log entry for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
}

/// Query filter for the admin audit surface
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub event_type: Option<AuditEventType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: i64,
    pub size: i64,
    pub ascending: bool,
}

/// Errors for audit log operations
#[derive(thiserror::Error, Debug)]
pub enum AuditLogError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AuditLog {
    /// Insert one entry (called from the journal worker, never from request
    /// handlers directly)
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        entry: NewAuditLog,
    ) -> Result<Self, AuditLogError> {
        use crate::schema::audit_logs::dsl::*;

        diesel::insert_into(audit_logs)
            .values(&entry)
            .get_result::<AuditLog>(conn)
            .await
            .map_err(AuditLogError::Database)
    }

    /// Filtered, paginated query ordered by created_at (descending unless
    /// the filter asks otherwise). Returns the page and the total match count.
    pub async fn query(
        conn: &mut AsyncPgConnection,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<Self>, i64), AuditLogError> {
        use crate::schema::audit_logs::dsl::*;

        let mut count_query = audit_logs
            .select(diesel::dsl::count_star())
            .into_boxed();
        let mut page_query = audit_logs.into_boxed();

        if let Some(tenant) = filter.tenant_id {
            count_query = count_query.filter(tenant_id.eq(tenant));
            page_query = page_query.filter(tenant_id.eq(tenant));
        }
        if let Some(user) = filter.user_id {
            count_query = count_query.filter(user_id.eq(user));
            page_query = page_query.filter(user_id.eq(user));
        }
        if let Some(kind) = filter.event_type {
            count_query = count_query.filter(event_type.eq(kind.as_str()));
            page_query = page_query.filter(event_type.eq(kind.as_str()));
        }
        if let Some(start) = filter.start_date {
            count_query = count_query.filter(created_at.ge(start));
            page_query = page_query.filter(created_at.ge(start));
        }
        if let Some(end) = filter.end_date {
            count_query = count_query.filter(created_at.le(end));
            page_query = page_query.filter(created_at.le(end));
        }

        let total = count_query.first::<i64>(conn).await?;

        page_query = if filter.ascending {
            page_query.order(created_at.asc())
        } else {
            page_query.order(created_at.desc())
        };

        let size = filter.size.clamp(1, 200);
        let page = filter.page.max(0);
        let entries = page_query
            .limit(size)
            .offset(page * size)
            .load::<AuditLog>(conn)
            .await?;

        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip() {
        let all = [
            AuditEventType::LoginSuccess,
            AuditEventType::LoginFailed,
            AuditEventType::Logout,
            AuditEventType::PasswordChange,
            AuditEventType::TokenRefresh,
            AuditEventType::AccountLocked,
            AuditEventType::AccountUnlocked,
            AuditEventType::UserCreated,
            AuditEventType::UserUpdated,
            AuditEventType::UserDeleted,
            AuditEventType::TenantCreated,
            AuditEventType::PermissionDenied,
            AuditEventType::SuspiciousActivity,
        ];

        for kind in all {
            assert_eq!(AuditEventType::from_str(kind.as_str()), Ok(kind));
        }

        assert!(AuditEventType::from_str("NOT_AN_EVENT").is_err());
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(AuditEventType::LoginSuccess.as_str(), "LOGIN_SUCCESS");
        assert_eq!(AuditEventType::AccountLocked.as_str(), "ACCOUNT_LOCKED");
        assert_eq!(
            AuditEventType::SuspiciousActivity.as_str(),
            "SUSPICIOUS_ACTIVITY"
        );
    }

    #[test]
    fn test_filter_defaults() {
        let filter = AuditLogFilter::default();
        assert!(filter.tenant_id.is_none());
        assert!(filter.event_type.is_none());
        assert!(!filter.ascending);
    }
}
