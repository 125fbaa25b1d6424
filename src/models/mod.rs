// Database models for the Sentra backend

pub mod audit_log;
pub mod auth;
pub mod refresh_token;
pub mod tenant;
pub mod user;

pub use audit_log::{AuditEventType, AuditLog, AuditLogError, AuditLogFilter, NewAuditLog};
pub use auth::AccessTokenClaims;
pub use refresh_token::{NewRefreshToken, RefreshToken, RefreshTokenError};
pub use tenant::{NewTenant, Tenant, TenantError};
pub use user::{NewUser, User, UserError, UserRole};
