// Request-scoped principal context
// Populated by the auth middleware from verified token claims and passed to
// handlers explicitly; there is no hidden per-thread state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// The authenticated principal attached to a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token_id: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
