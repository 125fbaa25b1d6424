// Admin endpoints: audit queries, signing key rotation, lockout management
// All routes here sit behind the bearer middleware plus the ADMIN gate.
// Admins operate within their own tenant; cross-tenant ids read as missing.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::CurrentUser,
    models::audit_log::{AuditEventType, AuditLog, AuditLogFilter},
    models::user::{User, UserError},
    utils::auth_errors::AuthError,
};

// =============================================================================
// AUDIT LOG QUERY
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub event_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
    pub sort: Option<String>,
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub event_type: String,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogEntry {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id.to_string(),
            event_type: log.event_type,
            user_id: log.user_id.map(|id| id.to_string()),
            tenant_id: log.tenant_id.map(|id| id.to_string()),
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            details: log.details,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogPage {
    pub content: Vec<AuditLogEntry>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
}

/// GET /api/admin/audit-logs
pub async fn query_audit_logs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, AuthError> {
    // Admins see their own tenant's journal; an explicit tenantId must match
    if let Some(requested) = query.tenant_id {
        if requested != current_user.tenant_id {
            return Err(AuthError::Forbidden);
        }
    }

    let event_type = match &query.event_type {
        Some(raw) => Some(
            AuditEventType::from_str(raw)
                .map_err(|_| AuthError::Validation(format!("eventType: unknown value {}", raw)))?,
        ),
        None => None,
    };

    let ascending = match query.sort.as_deref() {
        None | Some("desc") | Some("createdAt,desc") => false,
        Some("asc") | Some("createdAt,asc") => true,
        Some(other) => {
            return Err(AuthError::Validation(format!(
                "sort: unknown value {}",
                other
            )));
        },
    };

    if query.size < 1 || query.size > 200 {
        return Err(AuthError::Validation(
            "size: must be between 1 and 200".to_string(),
        ));
    }
    if query.page < 0 {
        return Err(AuthError::Validation("page: must not be negative".to_string()));
    }

    let filter = AuditLogFilter {
        tenant_id: Some(current_user.tenant_id),
        user_id: query.user_id,
        event_type,
        start_date: query.start_date,
        end_date: query.end_date,
        page: query.page,
        size: query.size,
        ascending,
    };

    let mut conn = state.diesel_pool.get().await.map_err(|e| {
        tracing::error!("Failed to get database connection: {}", e);
        AuthError::Internal
    })?;

    let (entries, total) = AuditLog::query(&mut conn, &filter).await.map_err(|e| {
        tracing::error!("Audit log query failed: {}", e);
        AuthError::Internal
    })?;

    Ok(Json(AuditLogPage {
        content: entries.into_iter().map(AuditLogEntry::from).collect(),
        page: query.page,
        size: query.size,
        total_elements: total,
    }))
}

// =============================================================================
// SIGNING KEY ROTATION
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateKeyRequest {
    pub new_secret: String,
}

/// POST /api/admin/security/rotate-jwt-key
pub async fn rotate_jwt_key(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(req): Json<RotateKeyRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if req.new_secret.len() < 32 {
        return Err(AuthError::Validation(
            "newSecret: must be at least 32 bytes".to_string(),
        ));
    }

    let key_id = state.key_provider.rotate(req.new_secret.as_bytes())?;

    tracing::info!(
        admin = %current_user.user_id,
        key_id = %key_id,
        "Signing key rotated by admin"
    );

    Ok(Json(json!({"keyId": key_id})))
}

// =============================================================================
// LOCKOUT MANAGEMENT
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutInfo {
    pub user_id: String,
    pub is_locked: bool,
    pub failed_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
}

async fn require_tenant_member(
    state: &AppState,
    current_user: &CurrentUser,
    user_id: Uuid,
) -> Result<User, AuthError> {
    let mut conn = state.diesel_pool.get().await.map_err(|e| {
        tracing::error!("Failed to get database connection: {}", e);
        AuthError::Internal
    })?;

    match User::find_by_id(&mut conn, user_id).await {
        Ok(user) if user.tenant_id == current_user.tenant_id => Ok(user),
        Ok(_) | Err(UserError::NotFound) => {
            Err(AuthError::NotFound("User not found".to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

/// GET /api/admin/users/{id}/lockout-status
pub async fn lockout_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    require_tenant_member(&state, &current_user, user_id).await?;

    let status = state.lockout_service.status(user_id).await?;

    Ok(Json(LockoutInfo {
        user_id: status.user_id.to_string(),
        is_locked: status.is_locked,
        failed_attempts: status.failed_attempts,
        locked_until: status.locked_until,
        remaining_minutes: status.remaining_minutes,
        remaining_attempts: status.remaining_attempts,
    }))
}

/// POST /api/admin/users/{id}/unlock
pub async fn unlock_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    require_tenant_member(&state, &current_user, user_id).await?;

    state.lockout_service.unlock(user_id).await?;

    tracing::info!(
        admin = %current_user.user_id,
        user = %user_id,
        "Account unlocked by admin"
    );

    Ok(Json(json!({"message": "Account unlocked"})))
}
