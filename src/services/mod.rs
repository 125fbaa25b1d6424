// Services module for the Sentra backend
// Business logic layer; handlers call into these.

pub mod audit;
pub mod auth;
pub mod background_tasks;
pub mod jwt;
pub mod keys;
pub mod lockout;
pub mod rate_limit;
pub mod refresh;
pub mod secrets;

pub use audit::{AuditDrain, AuditEvent, AuditJournal};
pub use auth::{AuthService, AuthSession, RegisterParams};
pub use background_tasks::spawn_maintenance;
pub use jwt::{TokenConfig, TokenError, TokenService};
pub use keys::{KeyError, KeyProvider};
pub use lockout::{LockoutConfig, LockoutError, LockoutService, LockoutStatus};
pub use rate_limit::{BucketConfig, RateLimiter};
pub use refresh::{RefreshConfig, RefreshError, RefreshService};
pub use secrets::{EnvSecrets, SecretsError, SecretsProvider};
