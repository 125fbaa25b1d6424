// Application state shared across handlers
// The composition root (main) builds every component explicitly and wires
// collaborators through constructors; there is no runtime graph discovery.

use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        AuditJournal, AuthService, KeyProvider, LockoutService, RateLimiter, RefreshService,
        TokenService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub key_provider: Arc<KeyProvider>,
    pub token_service: Arc<TokenService>,
    pub refresh_service: Arc<RefreshService>,
    pub lockout_service: Arc<LockoutService>,
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit: AuditJournal,
}
