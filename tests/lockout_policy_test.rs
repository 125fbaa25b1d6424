// Lockout tier policy boundaries

use sentra_backend_core::app_config::SecurityConfig;
use sentra_backend_core::LockoutConfig;

#[test]
fn test_default_tier_boundaries() {
    let config = LockoutConfig::default();

    // Attempts 1..4: not locked
    for attempts in 1..=4 {
        assert_eq!(
            config.duration_for_attempts(attempts),
            None,
            "attempt {} must not lock",
            attempts
        );
    }

    // Attempt 5: 15 minutes
    assert_eq!(config.duration_for_attempts(5), Some(15));

    // Attempts 6..9: counter advances, no new lock
    for attempts in 6..=9 {
        assert_eq!(config.duration_for_attempts(attempts), None);
    }

    // Attempt 10: 1 hour
    assert_eq!(config.duration_for_attempts(10), Some(60));

    // Attempt 15: 24 hours
    assert_eq!(config.duration_for_attempts(15), Some(24 * 60));

    // Counts above 15 keep the 24-hour ceiling
    for attempts in [16, 20, 99] {
        assert_eq!(config.duration_for_attempts(attempts), Some(24 * 60));
    }
}

#[test]
fn test_custom_tiers_follow_multiplier() {
    let settings = SecurityConfig {
        lockout_max_attempts: 3,
        lockout_duration_minutes: 10,
        lockout_progressive_multiplier: 6,
        refresh_token_expiry_days: 30,
        refresh_token_hash_salt: None,
    };
    let config = LockoutConfig::from_settings(&settings);

    assert_eq!(config.duration_for_attempts(3), Some(10));
    assert_eq!(config.duration_for_attempts(6), Some(60));
    assert_eq!(config.duration_for_attempts(9), Some(24 * 60));
}

#[test]
fn test_second_tier_respects_ceiling() {
    let settings = SecurityConfig {
        lockout_max_attempts: 5,
        lockout_duration_minutes: 600,
        lockout_progressive_multiplier: 10,
        refresh_token_expiry_days: 30,
        refresh_token_hash_salt: None,
    };
    let config = LockoutConfig::from_settings(&settings);

    assert_eq!(config.duration_for_attempts(5), Some(600));
    // 600 * 10 would exceed 24h; pinned to the ceiling
    assert_eq!(config.duration_for_attempts(10), Some(24 * 60));
}

#[test]
fn test_remaining_attempts_tracks_next_tier() {
    let config = LockoutConfig::default();

    assert_eq!(config.remaining_attempts(0), 5);
    assert_eq!(config.remaining_attempts(3), 2);
    assert_eq!(config.remaining_attempts(5), 5);
    assert_eq!(config.remaining_attempts(7), 3);
    assert_eq!(config.remaining_attempts(10), 5);
    assert_eq!(config.remaining_attempts(14), 1);
}
