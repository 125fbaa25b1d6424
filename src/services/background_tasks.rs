// Periodic maintenance
// One interval task owns the retention work: purging dead refresh tokens and
// sweeping retired signing keys past their grace window. Failures are logged
// and the next tick tries again.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::keys::KeyProvider;
use crate::services::refresh::RefreshService;

/// How long revoked refresh records are kept before purging (they remain
/// useful for reuse forensics for a while)
const REVOKED_RETENTION_DAYS: i64 = 30;

pub fn spawn_maintenance(
    refresh: Arc<RefreshService>,
    keys: Arc<KeyProvider>,
    interval_seconds: u64,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        // The first tick fires immediately; skip it so startup stays quiet
        interval.tick().await;

        loop {
            interval.tick().await;

            let now = Utc::now();
            match refresh.cleanup_expired(now).await {
                Ok(0) => {},
                Ok(count) => info!("Purged {} expired refresh tokens", count),
                Err(e) => warn!("Expired refresh token cleanup failed: {}", e),
            }

            let revoked_cutoff = now - ChronoDuration::days(REVOKED_RETENTION_DAYS);
            match refresh.cleanup_old_revoked(revoked_cutoff).await {
                Ok(0) => {},
                Ok(count) => info!("Purged {} old revoked refresh tokens", count),
                Err(e) => warn!("Revoked refresh token cleanup failed: {}", e),
            }

            let swept = keys.sweep();
            if swept > 0 {
                info!("Swept {} retired signing keys past grace", swept);
            }
        }
    });
}
