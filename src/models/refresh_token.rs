// Refresh token database model
// Only a salted hash of the token secret is stored; the plaintext is handed
// to the client exactly once at issuance. The hash column is unique, so a
// presented secret resolves to at most one record.
//
// The salt is deployment-wide (REFRESH_TOKEN_HASH_SALT). Changing it
// invalidates every outstanding refresh token; rotate it during a
// maintenance window.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::schema::refresh_tokens;

/// Refresh token database model
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable,
)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_hash: String,
    pub device: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
}

/// New refresh token for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_hash: String,
    pub device: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Errors for refresh token operations
#[derive(thiserror::Error, Debug)]
pub enum RefreshTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Token not found")]
    NotFound,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Token reuse detected - possible theft attempt")]
    ReuseDetected,
}

impl RefreshToken {
    /// Salted SHA-256 of the plaintext secret, hex-encoded. Deterministic so
    /// the unique index on token_hash serves as the lookup key; the secret's
    /// 256-bit entropy is what resists offline attack.
    pub fn hash_secret(plaintext: &str, salt: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(plaintext.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Insert a new refresh token record
    pub async fn store(
        conn: &mut AsyncPgConnection,
        new_token: NewRefreshToken,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        diesel::insert_into(refresh_tokens)
            .values(&new_token)
            .get_result::<RefreshToken>(conn)
            .await
            .map_err(RefreshTokenError::Database)
    }

    /// Look up a record by its stored hash
    pub async fn find_by_hash(
        conn: &mut AsyncPgConnection,
        hash: &str,
    ) -> Result<Self, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        refresh_tokens
            .filter(token_hash.eq(hash))
            .first::<RefreshToken>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RefreshTokenError::NotFound,
                _ => RefreshTokenError::Database(e),
            })
    }

    /// Look up a record by hash under a pessimistic lock. Rotation goes
    /// through this so that two concurrent rotations of the same token see
    /// exactly one winner.
    pub async fn find_by_hash_for_update(
        conn: &mut AsyncPgConnection,
        hash: &str,
    ) -> Result<Self, RefreshTokenError> {
        use diesel::sql_query;
        use diesel::sql_types::Text;

        sql_query(
            "SELECT id, user_id, tenant_id, token_hash, device, created_at, \
             expires_at, revoked_at, revoked_reason \
             FROM refresh_tokens \
             WHERE token_hash = $1 \
             FOR UPDATE",
        )
        .bind::<Text, _>(hash.to_string())
        .get_result::<RefreshToken>(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => RefreshTokenError::NotFound,
            _ => RefreshTokenError::Database(e),
        })
    }

    /// Mark a record revoked. Returns true when a live record was revoked,
    /// false when it was already revoked (revocation is monotone).
    pub async fn revoke(
        conn: &mut AsyncPgConnection,
        hash: &str,
        reason: Option<&str>,
    ) -> Result<bool, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            refresh_tokens
                .filter(token_hash.eq(hash))
                .filter(revoked_at.is_null()),
        )
        .set((revoked_at.eq(Some(now)), revoked_reason.eq(reason)))
        .execute(conn)
        .await?;

        Ok(updated > 0)
    }

    /// Revoke every still-active token for a user; returns the count affected
    pub async fn revoke_all_for_user(
        conn: &mut AsyncPgConnection,
        user: Uuid,
        reason: &str,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(
            refresh_tokens
                .filter(user_id.eq(user))
                .filter(revoked_at.is_null())
                .filter(expires_at.gt(now)),
        )
        .set((revoked_at.eq(Some(now)), revoked_reason.eq(Some(reason))))
        .execute(conn)
        .await?;

        Ok(updated)
    }

    /// Bulk purge of expired records
    pub async fn cleanup_expired(
        conn: &mut AsyncPgConnection,
        before: DateTime<Utc>,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let deleted = diesel::delete(refresh_tokens.filter(expires_at.le(before)))
            .execute(conn)
            .await?;

        Ok(deleted)
    }

    /// Bulk purge of records revoked before a cutoff
    pub async fn cleanup_old_revoked(
        conn: &mut AsyncPgConnection,
        before: DateTime<Utc>,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let deleted = diesel::delete(refresh_tokens.filter(revoked_at.le(before)))
            .execute(conn)
            .await?;

        Ok(deleted)
    }

    /// Valid iff not revoked and not expired
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_secret_hashing() {
        let salt = b"test-only-deployment-salt";

        let hash1 = RefreshToken::hash_secret("secret-one", salt);
        let hash2 = RefreshToken::hash_secret("secret-two", salt);
        assert_ne!(hash1, hash2);

        // Deterministic for the same (secret, salt) pair
        assert_eq!(hash1, RefreshToken::hash_secret("secret-one", salt));

        // A different salt changes the stored form
        let other = RefreshToken::hash_secret("secret-one", b"another-salt");
        assert_ne!(hash1, other);

        // SHA-256 hex: 64 hex chars
        assert_eq!(hash1.len(), 64);
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_state_checks() {
        let now = Utc::now();

        let active = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            device: None,
            created_at: now - Duration::hours(1),
            expires_at: now + Duration::days(30),
            revoked_at: None,
            revoked_reason: None,
        };
        assert!(active.is_active());
        assert!(!active.is_expired());
        assert!(!active.is_revoked());

        let expired = RefreshToken {
            expires_at: now - Duration::hours(1),
            ..active.clone()
        };
        assert!(!expired.is_active());
        assert!(expired.is_expired());

        let revoked = RefreshToken {
            revoked_at: Some(now - Duration::minutes(5)),
            revoked_reason: Some("rotation".to_string()),
            ..active.clone()
        };
        assert!(!revoked.is_active());
        assert!(revoked.is_revoked());
        assert!(!revoked.is_expired());
    }
}
