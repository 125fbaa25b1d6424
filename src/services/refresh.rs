// Refresh token session chain
// Long-lived opaque secrets with one-time-use rotation. Rotation is atomic:
// the old record is revoked and the replacement inserted in one transaction,
// with the row held FOR UPDATE so concurrent rotations of the same token see
// exactly one winner. Presenting an already-revoked token is treated as a
// breach signal: every live session for that user is torn down.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use diesel_async::AsyncConnection;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::SecurityConfig;
use crate::db::DieselPool;
use crate::models::audit_log::AuditEventType;
use crate::models::refresh_token::{NewRefreshToken, RefreshToken, RefreshTokenError};
use crate::services::audit::AuditJournal;

/// Entropy of the plaintext secret (256 bits)
const SECRET_BYTES: usize = 32;

/// Fallback hash salt outside production; from_env refuses to start
/// production without a configured salt
const DEV_HASH_SALT: &[u8] = b"sentra-dev-refresh-salt-not-for-production";

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Store error: {0}")]
    Store(#[from] RefreshTokenError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Invalid refresh token")]
    Invalid,

    #[error("Refresh token expired")]
    Expired,

    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token reuse detected")]
    Reuse,
}

/// Refresh token settings
#[derive(Clone)]
pub struct RefreshConfig {
    pub expiry_days: i64,
    pub hash_salt: Vec<u8>,
}

impl RefreshConfig {
    pub fn from_settings(settings: &SecurityConfig) -> Self {
        Self {
            expiry_days: settings.refresh_token_expiry_days,
            hash_salt: settings
                .refresh_token_hash_salt
                .as_ref()
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_else(|| DEV_HASH_SALT.to_vec()),
        }
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            expiry_days: 30,
            hash_salt: b"test-refresh-salt".to_vec(),
        }
    }
}

impl std::fmt::Debug for RefreshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshConfig")
            .field("expiry_days", &self.expiry_days)
            .field("hash_salt", &"<redacted>")
            .finish()
    }
}

/// Generates, validates, rotates, and revokes refresh tokens
pub struct RefreshService {
    pool: DieselPool,
    config: RefreshConfig,
    audit: AuditJournal,
}

impl RefreshService {
    pub fn new(pool: DieselPool, config: RefreshConfig, audit: AuditJournal) -> Self {
        Self {
            pool,
            config,
            audit,
        }
    }

    /// 32 bytes of CSPRNG output, base64url without padding
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn hash(&self, plaintext: &str) -> String {
        RefreshToken::hash_secret(plaintext, &self.config.hash_salt)
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
        RefreshError,
    > {
        self.pool
            .get()
            .await
            .map_err(|e| RefreshError::Pool(e.to_string()))
    }

    /// Create and persist a refresh token; the plaintext is returned to the
    /// caller exactly once
    pub async fn generate(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        device: Option<String>,
    ) -> Result<(String, RefreshToken), RefreshError> {
        let plaintext = Self::generate_secret();
        let expires_at = Utc::now() + Duration::days(self.config.expiry_days);

        let mut conn = self.conn().await?;
        let record = RefreshToken::store(
            &mut conn,
            NewRefreshToken {
                user_id,
                tenant_id,
                token_hash: self.hash(&plaintext),
                device,
                expires_at,
            },
        )
        .await?;

        Ok((plaintext, record))
    }

    /// True iff a record matches the presented secret and is neither revoked
    /// nor expired
    pub async fn validate(&self, plaintext: &str) -> Result<bool, RefreshError> {
        let mut conn = self.conn().await?;

        match RefreshToken::find_by_hash(&mut conn, &self.hash(plaintext)).await {
            Ok(record) => Ok(record.is_active()),
            Err(RefreshTokenError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// One-time-use rotation: revoke the presented token and mint its
    /// replacement atomically. A presented token whose record is already
    /// revoked is a reuse event: every live token of that user is revoked,
    /// SUSPICIOUS_ACTIVITY is journaled, and the call fails with `Reuse`.
    pub async fn rotate(&self, plaintext: &str) -> Result<(String, RefreshToken), RefreshError> {
        let presented_hash = self.hash(plaintext);
        let new_plaintext = Self::generate_secret();
        let new_hash = self.hash(&new_plaintext);
        let expiry_days = self.config.expiry_days;

        let mut conn = self.conn().await?;

        // The reuse teardown must COMMIT, so it is a success value of the
        // transaction rather than an error (errors roll back).
        enum Outcome {
            Rotated(RefreshToken),
            Reused {
                user_id: Uuid,
                tenant_id: Uuid,
                revoked_count: usize,
            },
        }

        let outcome = conn
            .transaction::<Outcome, RefreshError, _>(|tx| {
                Box::pin(async move {
                    let existing =
                        match RefreshToken::find_by_hash_for_update(tx, &presented_hash).await {
                            Ok(record) => record,
                            Err(RefreshTokenError::NotFound) => return Err(RefreshError::Invalid),
                            Err(e) => return Err(e.into()),
                        };

                    if existing.is_revoked() {
                        // Reuse of a retired token. Tear down every live
                        // session for the user inside the same transaction.
                        let revoked_count = RefreshToken::revoke_all_for_user(
                            tx,
                            existing.user_id,
                            "token_reuse_detected",
                        )
                        .await?;
                        return Ok(Outcome::Reused {
                            user_id: existing.user_id,
                            tenant_id: existing.tenant_id,
                            revoked_count,
                        });
                    }

                    if existing.is_expired() {
                        return Err(RefreshError::Expired);
                    }

                    RefreshToken::revoke(tx, &presented_hash, Some("rotation")).await?;

                    let replacement = RefreshToken::store(
                        tx,
                        NewRefreshToken {
                            user_id: existing.user_id,
                            tenant_id: existing.tenant_id,
                            token_hash: new_hash,
                            device: existing.device.clone(),
                            expires_at: Utc::now() + Duration::days(expiry_days),
                        },
                    )
                    .await?;

                    Ok(Outcome::Rotated(replacement))
                })
            })
            .await?;

        match outcome {
            Outcome::Rotated(record) => Ok((new_plaintext, record)),
            Outcome::Reused {
                user_id,
                tenant_id,
                revoked_count,
            } => {
                tracing::warn!(
                    user_id = %user_id,
                    revoked_count,
                    "Refresh token reuse detected, all sessions revoked"
                );
                self.audit.log(
                    AuditEventType::SuspiciousActivity,
                    Some(user_id),
                    Some(tenant_id),
                    None,
                    None,
                    Some(json!({
                        "reason": "refresh_token_reuse",
                        "revokedCount": revoked_count,
                    })),
                );
                Err(RefreshError::Reuse)
            },
        }
    }

    /// Revoke the single matching token. Idempotent for already-revoked
    /// records; unknown secrets fail with `NotFound`.
    pub async fn revoke(&self, plaintext: &str) -> Result<RefreshToken, RefreshError> {
        let mut conn = self.conn().await?;
        let hash = self.hash(plaintext);

        let record = match RefreshToken::find_by_hash(&mut conn, &hash).await {
            Ok(record) => record,
            Err(RefreshTokenError::NotFound) => return Err(RefreshError::NotFound),
            Err(e) => return Err(e.into()),
        };

        RefreshToken::revoke(&mut conn, &hash, Some("logout")).await?;
        Ok(record)
    }

    /// Revoke every active token for a user; returns the number affected
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<usize, RefreshError> {
        let mut conn = self.conn().await?;
        Ok(RefreshToken::revoke_all_for_user(&mut conn, user_id, "logout_all").await?)
    }

    /// Purge expired records older than the cutoff
    pub async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<usize, RefreshError> {
        let mut conn = self.conn().await?;
        Ok(RefreshToken::cleanup_expired(&mut conn, before).await?)
    }

    /// Purge records revoked before the cutoff
    pub async fn cleanup_old_revoked(&self, before: DateTime<Utc>) -> Result<usize, RefreshError> {
        let mut conn = self.conn().await?;
        Ok(RefreshToken::cleanup_old_revoked(&mut conn, before).await?)
    }
}
