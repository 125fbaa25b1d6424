// User endpoints
// Reads are tenant-scoped by the caller's verified claims: a user from
// another tenant is indistinguishable from a missing one.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::CurrentUser,
    models::user::{User, UserError},
    utils::auth_errors::AuthError,
};

/// User representation on the wire; never includes the password hash
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub tenant_id: String,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            name: user.full_name,
            tenant_id: user.tenant_id.to_string(),
            role: user.role,
            active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    let mut conn = state.diesel_pool.get().await.map_err(|e| {
        tracing::error!("Failed to get database connection: {}", e);
        AuthError::Internal
    })?;

    let user = match User::find_by_id(&mut conn, user_id).await {
        Ok(user) if user.tenant_id == current_user.tenant_id => user,
        Ok(_) | Err(UserError::NotFound) => {
            return Err(AuthError::NotFound("User not found".to_string()));
        },
        Err(e) => return Err(e.into()),
    };

    Ok(Json(UserResponse::from(user)))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<impl IntoResponse, AuthError> {
    let mut conn = state.diesel_pool.get().await.map_err(|e| {
        tracing::error!("Failed to get database connection: {}", e);
        AuthError::Internal
    })?;

    let users = User::list_for_tenant(&mut conn, current_user.tenant_id).await?;
    let response: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(response))
}
