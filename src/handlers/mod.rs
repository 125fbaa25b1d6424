// HTTP handlers for the Sentra backend

pub mod admin;
pub mod auth;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

/// Public authentication routes (register/login/refresh) — logout routes are
/// attached separately behind the bearer middleware
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token))
}

/// Authenticated session-management routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
}

/// Authenticated user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users))
        .route("/{id}", get(users::get_user))
}

/// Admin routes (bearer + ADMIN)
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(admin::query_audit_logs))
        .route("/security/rotate-jwt-key", post(admin::rotate_jwt_key))
        .route("/users/{id}/lockout-status", get(admin::lockout_status))
        .route("/users/{id}/unlock", post(admin::unlock_user))
}
