// Authentication orchestrator
// Composes lockout accounting, password verification, token issuance, the
// refresh chain, and the audit journal. Handlers stay thin: they parse,
// admit, and call into here.
//
// Credential failures are deliberately indistinguishable: unknown tenant,
// unknown user, wrong password, and inactive account all surface as
// InvalidCredentials. The audit journal records which factor actually failed.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::audit_log::AuditEventType;
use crate::models::refresh_token::RefreshToken;
use crate::models::tenant::{NewTenant, Tenant, TenantError};
use crate::models::user::{NewUser, User, UserError, UserRole};
use crate::services::audit::AuditJournal;
use crate::services::jwt::TokenService;
use crate::services::lockout::LockoutService;
use crate::services::refresh::RefreshService;
use crate::utils::auth_errors::AuthError;
use crate::utils::password::{hash_password, verify_password};
use crate::utils::request_info::RequestMeta;

/// Inputs for the registration flow
#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
    pub user_name: String,
}

/// A freshly established session: both credentials plus the identities they
/// were minted for
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: User,
    pub tenant: Tenant,
}

pub struct AuthService {
    pool: DieselPool,
    tokens: Arc<TokenService>,
    refresh: Arc<RefreshService>,
    lockout: Arc<LockoutService>,
    audit: AuditJournal,
}

impl AuthService {
    pub fn new(
        pool: DieselPool,
        tokens: Arc<TokenService>,
        refresh: Arc<RefreshService>,
        lockout: Arc<LockoutService>,
        audit: AuditJournal,
    ) -> Self {
        Self {
            pool,
            tokens,
            refresh,
            lockout,
            audit,
        }
    }

    async fn conn(
        &self,
    ) -> Result<
        bb8::PooledConnection<
            '_,
            diesel_async::pooled_connection::AsyncDieselConnectionManager<
                diesel_async::AsyncPgConnection,
            >,
        >,
        AuthError,
    > {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Failed to get database connection: {}", e);
            AuthError::Internal
        })
    }

    /// Mint the access/refresh pair for a user and assemble the session
    async fn establish_session(
        &self,
        user: User,
        tenant: Tenant,
        device: Option<String>,
    ) -> Result<AuthSession, AuthError> {
        let access_token =
            self.tokens
                .issue(user.id, tenant.id, &user.email, user.role_enum())?;

        let (refresh_token, _record) = self.refresh.generate(user.id, tenant.id, device).await?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_in: self.tokens.expires_in_seconds(),
            user,
            tenant,
        })
    }

    /// Create a tenant and its first (admin) user, then log them in
    pub async fn register(
        &self,
        params: RegisterParams,
        meta: &RequestMeta,
    ) -> Result<AuthSession, AuthError> {
        // Hash outside the transaction: argon2 is slow by design
        let password_hash = hash_password(&params.password)?;

        let mut conn = self.conn().await?;

        let tenant_name = params.tenant_name.clone();
        let tenant_slug = params.tenant_slug.clone();
        let email = params.email.clone();
        let user_name = params.user_name.clone();

        let (tenant, user) = {
            use diesel_async::AsyncConnection;

            conn.transaction::<(Tenant, User), AuthError, _>(|tx| {
                Box::pin(async move {
                    let tenant = Tenant::create(
                        tx,
                        NewTenant {
                            name: tenant_name,
                            slug: tenant_slug,
                        },
                    )
                    .await
                    .map_err(|e| match e {
                        TenantError::SlugTaken => {
                            AuthError::Conflict("Tenant slug already taken".to_string())
                        },
                        e => e.into(),
                    })?;

                    let user = User::create(
                        tx,
                        NewUser {
                            tenant_id: tenant.id,
                            email,
                            password_hash,
                            full_name: user_name,
                            role: UserRole::Admin.as_str().to_string(),
                        },
                    )
                    .await?;

                    Ok((tenant, user))
                })
            })
            .await?
        };

        self.audit.log(
            AuditEventType::TenantCreated,
            Some(user.id),
            Some(tenant.id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            Some(json!({"slug": tenant.slug, "name": tenant.name})),
        );
        self.audit.log(
            AuditEventType::UserCreated,
            Some(user.id),
            Some(tenant.id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            Some(json!({"role": user.role})),
        );

        self.establish_session(user, tenant, None).await
    }

    /// Authenticate a user within a tenant
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        tenant_slug: &str,
        device: Option<String>,
        meta: &RequestMeta,
    ) -> Result<AuthSession, AuthError> {
        let mut conn = self.conn().await?;

        let tenant = match Tenant::find_by_slug(&mut conn, tenant_slug).await {
            Ok(tenant) => tenant,
            Err(TenantError::NotFound) => {
                // Do not reveal whether the tenant exists
                self.audit.log(
                    AuditEventType::LoginFailed,
                    None,
                    None,
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                    Some(json!({"reason": "Tenant not found", "tenantSlug": tenant_slug})),
                );
                return Err(AuthError::InvalidCredentials);
            },
            Err(e) => return Err(e.into()),
        };

        let user = match User::find_by_email_and_tenant(&mut conn, email, tenant.id).await {
            Ok(user) => user,
            Err(UserError::NotFound) => {
                self.audit.log(
                    AuditEventType::LoginFailed,
                    None,
                    Some(tenant.id),
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                    Some(json!({"reason": "User not found"})),
                );
                return Err(AuthError::InvalidCredentials);
            },
            Err(e) => return Err(e.into()),
        };
        drop(conn);

        // A locked account rejects before password verification and without
        // advancing the counter
        if self.lockout.is_locked(user.id).await? {
            let remaining = self.lockout.remaining_minutes(user.id).await?;
            return Err(AuthError::AccountLocked {
                locked_until: user.locked_until,
                remaining_minutes: remaining,
            });
        }

        if !verify_password(password, &user.password_hash)? {
            self.lockout.record_failed_attempt(user.id).await?;
            self.audit.log(
                AuditEventType::LoginFailed,
                Some(user.id),
                Some(tenant.id),
                meta.ip.clone(),
                meta.user_agent.clone(),
                Some(json!({"reason": "Invalid password"})),
            );
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            self.audit.log(
                AuditEventType::LoginFailed,
                Some(user.id),
                Some(tenant.id),
                meta.ip.clone(),
                meta.user_agent.clone(),
                Some(json!({"reason": "Account inactive"})),
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.reset_failed_attempts(user.id).await?;

        let session = self.establish_session(user, tenant, device).await?;

        self.audit.log(
            AuditEventType::LoginSuccess,
            Some(session.user.id),
            Some(session.tenant.id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            None,
        );

        Ok(session)
    }

    /// Exchange a refresh token for a fresh access/refresh pair
    pub async fn refresh(
        &self,
        refresh_plaintext: &str,
        meta: &RequestMeta,
    ) -> Result<AuthSession, AuthError> {
        let (new_refresh, record) = self.refresh.rotate(refresh_plaintext).await?;

        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, record.user_id)
            .await
            .map_err(|_| AuthError::TokenInvalid)?;
        let tenant = Tenant::find_by_id(&mut conn, record.tenant_id)
            .await
            .map_err(|_| AuthError::TokenInvalid)?;
        drop(conn);

        // The session chain survives rotation, but a lock or deactivation
        // placed since the last refresh still wins
        if self.lockout.is_locked(user.id).await? {
            let remaining = self.lockout.remaining_minutes(user.id).await?;
            return Err(AuthError::AccountLocked {
                locked_until: user.locked_until,
                remaining_minutes: remaining,
            });
        }
        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token =
            self.tokens
                .issue(user.id, tenant.id, &user.email, user.role_enum())?;

        self.audit.log(
            AuditEventType::TokenRefresh,
            Some(user.id),
            Some(tenant.id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            None,
        );

        Ok(AuthSession {
            access_token,
            refresh_token: new_refresh,
            expires_in: self.tokens.expires_in_seconds(),
            user,
            tenant,
        })
    }

    /// Revoke a single refresh token
    pub async fn logout(
        &self,
        refresh_plaintext: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let record: RefreshToken = self.refresh.revoke(refresh_plaintext).await?;

        self.audit.log(
            AuditEventType::Logout,
            Some(record.user_id),
            Some(record.tenant_id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            None,
        );

        Ok(())
    }

    /// Revoke every active refresh token for a user; returns the count
    pub async fn logout_all(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<usize, AuthError> {
        let revoked = self.refresh.revoke_all_for_user(user_id).await?;

        self.audit.log(
            AuditEventType::Logout,
            Some(user_id),
            Some(tenant_id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            Some(json!({"scope": "all", "revokedCount": revoked})),
        );

        Ok(revoked)
    }
}
