// Audit journal queue semantics without a database
// The enqueue side must never block or fail the caller; overflow evicts the
// oldest buffered event; structured details must survive the trip intact.

use serde_json::json;
use uuid::Uuid;

use sentra_backend_core::models::audit_log::AuditEventType;
use sentra_backend_core::AuditJournal;

#[tokio::test]
async fn test_events_arrive_in_thread_order() {
    let (journal, mut drain) = AuditJournal::detached(16);
    let user = Uuid::new_v4();

    journal.log(
        AuditEventType::LoginFailed,
        Some(user),
        None,
        None,
        None,
        Some(json!({"reason": "Invalid password"})),
    );
    journal.log(AuditEventType::AccountLocked, Some(user), None, None, None, None);
    journal.log(AuditEventType::LoginSuccess, Some(user), None, None, None, None);

    // Within a single thread the enqueue order is preserved
    assert_eq!(drain.recv().await.kind, AuditEventType::LoginFailed);
    assert_eq!(drain.recv().await.kind, AuditEventType::AccountLocked);
    assert_eq!(drain.recv().await.kind, AuditEventType::LoginSuccess);
}

#[tokio::test]
async fn test_overflow_evicts_oldest_and_keeps_queue_bounded() {
    let (journal, mut drain) = AuditJournal::detached(4);

    for i in 0..10 {
        journal.log(
            AuditEventType::TokenRefresh,
            None,
            None,
            None,
            None,
            Some(json!({"seq": i})),
        );
    }

    // The queue holds the NEWEST four events; the six oldest were evicted,
    // and the caller never blocked
    let mut received = Vec::new();
    while let Some(event) = drain.try_recv() {
        received.push(event.details["seq"].as_i64().unwrap());
    }
    assert_eq!(received, vec![6, 7, 8, 9]);
}

#[tokio::test]
async fn test_structured_details_round_trip() {
    let (journal, mut drain) = AuditJournal::detached(8);

    let details = json!({
        "failedAttempts": 5,
        "lockDurationMinutes": 15,
        "window": {"start": "2025-01-10T00:00:00Z", "tiers": [5, 10, 15]},
        "automatic": true,
        "note": null
    });

    journal.log(
        AuditEventType::AccountLocked,
        Some(Uuid::new_v4()),
        Some(Uuid::new_v4()),
        Some("203.0.113.9".to_string()),
        Some("Mozilla/5.0".to_string()),
        Some(details.clone()),
    );

    let event = drain.recv().await;
    assert_eq!(event.details, details);
    assert_eq!(event.details["window"]["tiers"][2], 15);
    assert_eq!(event.ip_address.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_caller_survives_worker_disappearing() {
    let (journal, drain) = AuditJournal::detached(4);
    drop(drain);

    // Losing the draining end must not panic or error the caller
    journal.log(AuditEventType::Logout, None, None, None, None, None);
}
