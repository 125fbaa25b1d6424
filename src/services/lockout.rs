// Progressive account lockout
// Failed-attempt accounting is per user, never per tenant or global, and the
// increment runs under a row lock so concurrent failures cannot lose updates.
// A failed attempt against an already-locked account does not advance the
// counter; an attacker driving failures cannot extend the lockout.

use chrono::{DateTime, Duration, Utc};
use diesel_async::AsyncConnection;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::SecurityConfig;
use crate::db::DieselPool;
use crate::models::audit_log::AuditEventType;
use crate::models::user::{User, UserError};
use crate::services::audit::AuditJournal;

/// Ceiling on any lockout duration
const MAX_LOCKOUT_MINUTES: u64 = 24 * 60;

#[derive(Error, Debug)]
pub enum LockoutError {
    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),
}

/// Tiered lockout policy. Tiers sit at max_attempts, 2x and 3x; durations
/// grow by the multiplier and the final tier is pinned to the 24-hour
/// ceiling.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub base_duration_minutes: u64,
    pub progressive_multiplier: u64,
}

impl LockoutConfig {
    pub fn from_settings(settings: &SecurityConfig) -> Self {
        Self {
            max_attempts: settings.lockout_max_attempts.max(1),
            base_duration_minutes: settings.lockout_duration_minutes.max(1),
            progressive_multiplier: settings.lockout_progressive_multiplier.max(1),
        }
    }

    /// Lockout duration triggered by reaching `attempts`, if any. Only exact
    /// tier crossings lock; counts past the last tier re-lock at the ceiling.
    pub fn duration_for_attempts(&self, attempts: u32) -> Option<u64> {
        if attempts == self.max_attempts {
            Some(self.base_duration_minutes.min(MAX_LOCKOUT_MINUTES))
        } else if attempts == self.max_attempts * 2 {
            Some(
                (self.base_duration_minutes * self.progressive_multiplier)
                    .min(MAX_LOCKOUT_MINUTES),
            )
        } else if attempts >= self.max_attempts * 3 {
            Some(MAX_LOCKOUT_MINUTES)
        } else {
            None
        }
    }

    /// Attempts remaining before the next tier locks the account
    pub fn remaining_attempts(&self, attempts: u32) -> u32 {
        let next_tier = if attempts < self.max_attempts {
            self.max_attempts
        } else if attempts < self.max_attempts * 2 {
            self.max_attempts * 2
        } else {
            self.max_attempts * 3
        };
        next_tier.saturating_sub(attempts)
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_duration_minutes: 15,
            progressive_multiplier: 4,
        }
    }
}

/// Snapshot of a user's lockout state for the admin surface
#[derive(Debug, Clone)]
pub struct LockoutStatus {
    pub user_id: Uuid,
    pub is_locked: bool,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub remaining_minutes: Option<i64>,
    pub remaining_attempts: Option<u32>,
}

/// Tracks failed-login state per user and applies tiered lockout windows
pub struct LockoutService {
    pool: DieselPool,
    config: LockoutConfig,
    audit: AuditJournal,
}

impl LockoutService {
    pub fn new(pool: DieselPool, config: LockoutConfig, audit: AuditJournal) -> Self {
        Self {
            pool,
            config,
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
        LockoutError,
    > {
        self.pool
            .get()
            .await
            .map_err(|e| LockoutError::Pool(e.to_string()))
    }

    /// True iff the user's lockout window is still in the future. An elapsed
    /// window is cleared on read (self-healing auto-unlock) and journaled.
    pub async fn is_locked(&self, user_id: Uuid) -> Result<bool, LockoutError> {
        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;

        match user.locked_until {
            Some(until) if until > Utc::now() => Ok(true),
            Some(_) => {
                // The window elapsed; clear it but keep the counter so the
                // next failure advances toward the next tier
                User::set_lockout_state(
                    &mut conn,
                    user_id,
                    user.failed_login_attempts,
                    None,
                    user.last_failed_login,
                )
                .await?;

                self.audit.log(
                    AuditEventType::AccountUnlocked,
                    Some(user_id),
                    Some(user.tenant_id),
                    None,
                    None,
                    Some(json!({"reason": "automatic"})),
                );

                Ok(false)
            },
            None => Ok(false),
        }
    }

    /// Record one failed login. Increments under a row lock; crossing a tier
    /// boundary sets the lockout window and journals ACCOUNT_LOCKED.
    pub async fn record_failed_attempt(&self, user_id: Uuid) -> Result<(), LockoutError> {
        let mut conn = self.conn().await?;
        let config = self.config.clone();

        let locked_info = conn
            .transaction::<Option<(Uuid, u32, u64)>, LockoutError, _>(|tx| {
                Box::pin(async move {
                    let user = User::find_for_update(tx, user_id).await?;

                    // Already locked: the counter stays frozen
                    if user.is_locked() {
                        return Ok(None);
                    }

                    let attempts = (user.failed_login_attempts as u32).saturating_add(1);
                    let now = Utc::now();

                    let lock_duration = config.duration_for_attempts(attempts);
                    let locked_until = lock_duration
                        .map(|minutes| now + Duration::minutes(minutes as i64));

                    User::set_lockout_state(tx, user_id, attempts as i32, locked_until, Some(now))
                        .await?;

                    Ok(lock_duration.map(|minutes| (user.tenant_id, attempts, minutes)))
                })
            })
            .await?;

        if let Some((tenant_id, attempts, minutes)) = locked_info {
            tracing::warn!(
                user_id = %user_id,
                failed_attempts = attempts,
                lock_minutes = minutes,
                "Account locked after repeated failed logins"
            );
            self.audit.log(
                AuditEventType::AccountLocked,
                Some(user_id),
                Some(tenant_id),
                None,
                None,
                Some(json!({
                    "failedAttempts": attempts,
                    "lockDurationMinutes": minutes,
                })),
            );
        }

        Ok(())
    }

    /// Zero the counter and clear both timestamps; called on any successful
    /// authentication
    pub async fn reset_failed_attempts(&self, user_id: Uuid) -> Result<(), LockoutError> {
        let mut conn = self.conn().await?;
        User::set_lockout_state(&mut conn, user_id, 0, None, None).await?;
        Ok(())
    }

    /// Explicit admin unlock
    pub async fn unlock(&self, user_id: Uuid) -> Result<(), LockoutError> {
        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;
        User::set_lockout_state(&mut conn, user_id, 0, None, None).await?;

        self.audit.log(
            AuditEventType::AccountUnlocked,
            Some(user_id),
            Some(user.tenant_id),
            None,
            None,
            Some(json!({"reason": "manual"})),
        );

        Ok(())
    }

    /// Lockout snapshot for the admin surface
    pub async fn status(&self, user_id: Uuid) -> Result<LockoutStatus, LockoutError> {
        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;

        let now = Utc::now();
        let is_locked = user.is_locked();
        let attempts = user.failed_login_attempts.max(0) as u32;

        let remaining_minutes = user.locked_until.and_then(|until| {
            let minutes = (until - now).num_minutes();
            (minutes >= 0 && is_locked).then_some(minutes.max(1))
        });

        Ok(LockoutStatus {
            user_id,
            is_locked,
            failed_attempts: attempts,
            locked_until: is_locked.then(|| user.locked_until).flatten(),
            remaining_minutes,
            remaining_attempts: (!is_locked).then(|| self.config.remaining_attempts(attempts)),
        })
    }

    /// Minutes until the lockout for this user elapses (for error bodies)
    pub async fn remaining_minutes(&self, user_id: Uuid) -> Result<i64, LockoutError> {
        let mut conn = self.conn().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;

        Ok(user
            .locked_until
            .map(|until| (until - Utc::now()).num_minutes().max(1))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_table() {
        let config = LockoutConfig::default();

        // 1..4 failures never lock
        for attempts in 1..5 {
            assert_eq!(config.duration_for_attempts(attempts), None);
        }

        // Exact crossings lock with growing durations
        assert_eq!(config.duration_for_attempts(5), Some(15));
        assert_eq!(config.duration_for_attempts(10), Some(60));
        assert_eq!(config.duration_for_attempts(15), Some(1440));

        // Between tiers the counter advances without locking
        for attempts in [6, 7, 8, 9, 11, 12, 13, 14] {
            assert_eq!(config.duration_for_attempts(attempts), None);
        }

        // Past the last tier every failure re-locks at the ceiling
        assert_eq!(config.duration_for_attempts(16), Some(1440));
        assert_eq!(config.duration_for_attempts(40), Some(1440));
    }

    #[test]
    fn test_durations_never_exceed_ceiling() {
        let config = LockoutConfig {
            max_attempts: 3,
            base_duration_minutes: 1000,
            progressive_multiplier: 10,
        };

        assert_eq!(config.duration_for_attempts(3), Some(1000));
        assert_eq!(config.duration_for_attempts(6), Some(1440));
        assert_eq!(config.duration_for_attempts(9), Some(1440));
    }

    #[test]
    fn test_remaining_attempts() {
        let config = LockoutConfig::default();

        assert_eq!(config.remaining_attempts(0), 5);
        assert_eq!(config.remaining_attempts(4), 1);
        assert_eq!(config.remaining_attempts(5), 5);
        assert_eq!(config.remaining_attempts(9), 1);
        assert_eq!(config.remaining_attempts(12), 3);
    }

    #[test]
    fn test_from_settings_guards_zeroes() {
        let settings = SecurityConfig {
            lockout_max_attempts: 0,
            lockout_duration_minutes: 0,
            lockout_progressive_multiplier: 0,
            refresh_token_expiry_days: 30,
            refresh_token_hash_salt: None,
        };

        let config = LockoutConfig::from_settings(&settings);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.base_duration_minutes, 1);
        assert_eq!(config.progressive_multiplier, 1);
    }
}
