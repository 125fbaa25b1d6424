// Authentication endpoints
// Handlers admit (rate limit), parse, and delegate to AuthService; the
// response DTOs use camelCase wire names.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::CurrentUser,
    services::auth::{AuthSession, RegisterParams},
    services::rate_limit::{login_key, register_key, BucketConfig},
    utils::{
        auth_errors::AuthError, extract_client_ip, is_valid_slug, trim_and_validate_field,
        trim_optional_field, RequestMeta,
    },
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Tenant name is required"))]
    pub tenant_name: String,

    #[validate(length(min = 1, max = 100, message = "Tenant slug is required"))]
    pub tenant_slug: String,

    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "User name is required"))]
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub tenant_slug: String,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            token_type: "Bearer".to_string(),
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
            user_id: session.user.id.to_string(),
            tenant_id: session.tenant.id.to_string(),
            tenant_name: session.tenant.name,
            email: session.user.email,
            name: session.user.full_name,
            role: session.user.role,
        }
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /api/auth/register - Create a tenant and its admin user
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let ip = extract_client_ip(&headers, &addr);
    let bucket = BucketConfig::register(&state.config.rate_limits);
    if !state.rate_limiter.try_consume(&register_key(&ip), &bucket, 1) {
        return Err(AuthError::RateLimited);
    }

    if let Err(errors) = req.validate() {
        return Err(AuthError::Validation(validation_message(&errors)));
    }

    let tenant_slug = req.tenant_slug.trim().to_lowercase();
    if !is_valid_slug(&tenant_slug) {
        return Err(AuthError::Validation(
            "tenantSlug: must be lowercase alphanumerics and hyphens".to_string(),
        ));
    }

    let params = RegisterParams {
        tenant_name: trim_and_validate_field(&req.tenant_name, "tenantName")
            .map_err(AuthError::Validation)?,
        tenant_slug,
        email: req.email.trim().to_lowercase(),
        password: req.password,
        user_name: trim_and_validate_field(&req.user_name, "userName")
            .map_err(AuthError::Validation)?,
    };

    let meta = RequestMeta::from_parts(&headers, &addr);
    let session = state.auth_service.register(params, &meta).await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::from(session))))
}

/// POST /api/auth/login - Authenticate within a tenant
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    // Admission comes first: a denied source never reaches credential
    // handling regardless of what it submitted
    let ip = extract_client_ip(&headers, &addr);
    let bucket = BucketConfig::login(&state.config.rate_limits);
    if !state.rate_limiter.try_consume(&login_key(&ip), &bucket, 1) {
        return Err(AuthError::RateLimited);
    }

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidCredentials);
    }

    let meta = RequestMeta::from_parts(&headers, &addr);
    let session = state
        .auth_service
        .login(
            &email,
            &req.password,
            req.tenant_slug.trim(),
            trim_optional_field(req.device),
            &meta,
        )
        .await?;

    Ok((StatusCode::OK, Json(AuthResponse::from(session))))
}

/// POST /api/auth/refresh - Rotate a refresh token for a fresh pair
pub async fn refresh_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if req.refresh_token.trim().is_empty() {
        return Err(AuthError::Validation(
            "refreshToken: must not be empty".to_string(),
        ));
    }

    let meta = RequestMeta::from_parts(&headers, &addr);
    let session = state
        .auth_service
        .refresh(req.refresh_token.trim(), &meta)
        .await?;

    Ok((StatusCode::OK, Json(AuthResponse::from(session))))
}

/// POST /api/auth/logout - Revoke a single refresh token (bearer required)
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    _current_user: CurrentUser,
    headers: HeaderMap,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let meta = RequestMeta::from_parts(&headers, &addr);
    state
        .auth_service
        .logout(req.refresh_token.trim(), &meta)
        .await?;

    Ok((StatusCode::OK, Json(json!({"message": "Logged out"}))))
}

/// POST /api/auth/logout-all - Revoke every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    current_user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let meta = RequestMeta::from_parts(&headers, &addr);
    let revoked = state
        .auth_service
        .logout_all(current_user.user_id, current_user.tenant_id, &meta)
        .await?;

    Ok((StatusCode::OK, Json(json!({"revokedCount": revoked}))))
}
