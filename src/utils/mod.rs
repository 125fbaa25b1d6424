// Utility modules for the Sentra backend

pub mod auth_errors;
pub mod password;
pub mod request_info;
pub mod validation;

pub use auth_errors::{AuthError, ErrorBody};
pub use password::{hash_password, verify_password, PasswordError};
pub use request_info::{extract_client_ip, RequestMeta};
pub use validation::{is_valid_slug, trim_and_validate_field, trim_optional_field};
