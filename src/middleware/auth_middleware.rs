// Bearer authentication middleware
// Extracts the bearer token, verifies it through the TokenService (which
// resolves the signing key by the header key id), and injects CurrentUser
// into request extensions.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::auth::CurrentUser;
use crate::models::audit_log::AuditEventType;
use crate::models::user::UserRole;
use crate::utils::auth_errors::AuthError;

/// Validate the bearer token and populate the request principal
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return AuthError::Unauthenticated.into_response(),
    };

    let claims = match state.token_service.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("Bearer token rejected: {}", e);
            return AuthError::from(e).into_response();
        },
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return AuthError::TokenInvalid.into_response(),
    };
    let tenant_id = match Uuid::parse_str(&claims.tenant_id) {
        Ok(id) => id,
        Err(_) => return AuthError::TokenInvalid.into_response(),
    };
    let role = match UserRole::from_str(&claims.role) {
        Ok(role) => role,
        Err(_) => return AuthError::TokenInvalid.into_response(),
    };

    let current_user = CurrentUser {
        user_id,
        tenant_id,
        email: claims.email,
        role,
        token_id: claims.jti,
    };

    request.extensions_mut().insert(current_user);
    next.run(request).await
}

/// Gate for admin-only routes; a non-admin principal is journaled and
/// rejected with 403
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let current_user = match request.extensions().get::<CurrentUser>() {
        Some(user) => user.clone(),
        None => return AuthError::Unauthenticated.into_response(),
    };

    if !current_user.is_admin() {
        state.audit.log(
            AuditEventType::PermissionDenied,
            Some(current_user.user_id),
            Some(current_user.tenant_id),
            None,
            None,
            Some(json!({"path": request.uri().path()})),
        );
        return AuthError::Forbidden.into_response();
    }

    next.run(request).await
}

/// Extractor so handlers can take CurrentUser as a parameter
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AuthError::Unauthenticated.into_response())
    }
}
