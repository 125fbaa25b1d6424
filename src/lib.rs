// Library exports for the Sentra backend

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, ConfigError, Environment};
pub use db::{create_diesel_pool, DieselPool};
pub use middleware::{api_rate_limit_middleware, auth_middleware, require_admin, CurrentUser};
pub use models::auth::AccessTokenClaims;
pub use models::{
    AuditEventType, AuditLog, AuditLogFilter, RefreshToken, RefreshTokenError, Tenant, User,
    UserRole,
};
pub use services::{
    AuditJournal, AuthService, AuthSession, BucketConfig, EnvSecrets, KeyError, KeyProvider,
    LockoutConfig, LockoutService, RateLimiter, RefreshConfig, RefreshError, RefreshService,
    RegisterParams, SecretsError, SecretsProvider, TokenConfig, TokenError, TokenService,
};
pub use utils::{AuthError, ErrorBody};

// Re-export route builders
pub use handlers::{admin_routes, auth_routes, session_routes, user_routes};
