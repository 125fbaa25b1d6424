// Middleware modules for the Sentra backend

pub mod auth;
pub mod auth_middleware;
pub mod rate_limit;
pub mod security_headers;

pub use auth::CurrentUser;
pub use auth_middleware::{auth_middleware, require_admin};
pub use rate_limit::api_rate_limit_middleware;
pub use security_headers::{security_headers_middleware, SecurityHeadersConfig};
