// Edge error taxonomy
// Services return these variants; the HTTP edge is the only layer that
// translates them to status codes and the stable JSON shape
// {error, message, timestamp}. Credential, token, and tenant failures all
// collapse to 401 so a caller cannot tell which factor failed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::refresh_token::RefreshTokenError;
use crate::models::tenant::TenantError;
use crate::models::user::UserError;
use crate::services::jwt::TokenError;
use crate::services::keys::KeyError;
use crate::services::lockout::LockoutError;
use crate::services::refresh::RefreshError;
use crate::utils::password::PasswordError;

/// Authentication and admission errors surfaced to clients
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Refresh token reuse detected")]
    TokenReuse,

    #[error("Token signed with an unknown key")]
    UnknownKey,

    #[error("Account is locked; retry in {remaining_minutes} minutes")]
    AccountLocked {
        locked_until: Option<DateTime<Utc>>,
        remaining_minutes: i64,
    },

    #[error("Too many requests")]
    RateLimited,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

/// Stable error body shape
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenReuse
            | AuthError::UnknownKey
            | AuthError::AccountLocked { .. }
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenReuse => "SECURITY_VIOLATION",
            AuthError::UnknownKey => "TOKEN_INVALID",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::RateLimited => "RATE_LIMITED",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        let (locked_until, remaining_minutes) = match &self {
            AuthError::AccountLocked {
                locked_until,
                remaining_minutes,
            } => (*locked_until, Some(*remaining_minutes)),
            _ => (None, None),
        };

        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
            timestamp: Utc::now(),
            locked_until,
            remaining_minutes,
        };

        (status, Json(body)).into_response()
    }
}

// Deep-layer errors collapse to their edge representation here. Anything
// unexpected becomes Internal after being logged at the call site.

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::UnknownKey => AuthError::UnknownKey,
            TokenError::Invalid => AuthError::TokenInvalid,
            TokenError::Encoding(e) => {
                tracing::error!("Token encoding failure: {}", e);
                AuthError::Internal
            },
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Invalid => AuthError::TokenInvalid,
            RefreshError::Expired => AuthError::TokenExpired,
            RefreshError::Reuse => AuthError::TokenReuse,
            RefreshError::NotFound => AuthError::NotFound("Refresh token not found".to_string()),
            RefreshError::Store(e) => {
                tracing::error!("Refresh store failure: {}", e);
                AuthError::Internal
            },
            RefreshError::Database(e) => {
                tracing::error!("Refresh database failure: {}", e);
                AuthError::Internal
            },
            RefreshError::Pool(e) => {
                tracing::error!("Refresh pool failure: {}", e);
                AuthError::Internal
            },
        }
    }
}

impl From<LockoutError> for AuthError {
    fn from(err: LockoutError) -> Self {
        match err {
            LockoutError::User(UserError::NotFound) => {
                AuthError::NotFound("User not found".to_string())
            },
            e => {
                tracing::error!("Lockout failure: {}", e);
                AuthError::Internal
            },
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        tracing::error!("Password primitive failure: {}", err);
        AuthError::Internal
    }
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AuthError::NotFound("User not found".to_string()),
            UserError::EmailTaken => {
                AuthError::Conflict("Email already registered for tenant".to_string())
            },
            UserError::Database(e) => {
                tracing::error!("User database failure: {}", e);
                AuthError::Internal
            },
        }
    }
}

impl From<TenantError> for AuthError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound => AuthError::NotFound("Tenant not found".to_string()),
            TenantError::SlugTaken => AuthError::Conflict("Tenant slug already taken".to_string()),
            TenantError::Database(e) => {
                tracing::error!("Tenant database failure: {}", e);
                AuthError::Internal
            },
        }
    }
}

impl From<diesel::result::Error> for AuthError {
    fn from(err: diesel::result::Error) -> Self {
        tracing::error!("Database failure: {}", err);
        AuthError::Internal
    }
}

impl From<RefreshTokenError> for AuthError {
    fn from(err: RefreshTokenError) -> Self {
        match err {
            RefreshTokenError::NotFound => {
                AuthError::NotFound("Refresh token not found".to_string())
            },
            RefreshTokenError::Expired => AuthError::TokenExpired,
            RefreshTokenError::Revoked | RefreshTokenError::ReuseDetected => AuthError::TokenReuse,
            RefreshTokenError::Database(e) => {
                tracing::error!("Refresh token database failure: {}", e);
                AuthError::Internal
            },
        }
    }
}
