// Asynchronous audit journal
// Callers enqueue and return immediately; a background worker owns the
// database writes. Audit is best-effort durable: a failed write drops the
// event, and a full queue evicts the OLDEST buffered event to admit the new
// one. Either loss is logged to the process log, never surfaced to the
// caller.
//
// The queue is a bounded deque rather than a channel because channels shed
// load by rejecting the incoming send; eviction here must come off the front.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{error, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::audit_log::{AuditEventType, AuditLog, NewAuditLog};

/// Default bound for the in-flight event queue
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// One security event on its way to the journal
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub kind: AuditEventType,
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    fn into_row(self) -> NewAuditLog {
        NewAuditLog {
            event_type: self.kind.as_str().to_string(),
            user_id: self.user_id,
            tenant_id: self.tenant_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            details: self.details,
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<AuditEvent>>,
    notify: Notify,
    capacity: usize,
}

/// Cloneable handle to the journal queue
#[derive(Clone)]
pub struct AuditJournal {
    shared: Arc<Shared>,
}

/// The consuming end of the journal queue, owned by the worker (or by a
/// test observing emitted events)
pub struct AuditDrain {
    shared: Arc<Shared>,
}

impl AuditDrain {
    pub fn try_recv(&mut self) -> Option<AuditEvent> {
        self.shared
            .queue
            .lock()
            .expect("audit queue lock poisoned")
            .pop_front()
    }

    pub async fn recv(&mut self) -> AuditEvent {
        loop {
            if let Some(event) = self.try_recv() {
                return event;
            }
            self.shared.notify.notified().await;
        }
    }
}

impl AuditJournal {
    /// Spawn the journal worker and return the enqueue handle
    pub fn spawn(pool: DieselPool, queue_depth: usize) -> Self {
        let (journal, drain) = Self::detached(queue_depth);
        tokio::spawn(run_worker(pool, drain));
        journal
    }

    /// Construct a journal with no worker attached; the caller owns the
    /// draining end. Used by unit tests to observe emitted events.
    pub fn detached(queue_depth: usize) -> (Self, AuditDrain) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(queue_depth.max(1))),
            notify: Notify::new(),
            capacity: queue_depth.max(1),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            AuditDrain { shared },
        )
    }

    /// Record a security event. Never blocks and never fails the caller;
    /// a full queue evicts its oldest buffered event to admit this one.
    pub fn log(
        &self,
        kind: AuditEventType,
        user_id: Option<Uuid>,
        tenant_id: Option<Uuid>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        details: Option<Value>,
    ) {
        let event = AuditEvent {
            kind,
            user_id,
            tenant_id,
            ip_address,
            user_agent,
            details: details.unwrap_or_else(|| Value::Object(Default::default())),
        };

        let evicted = {
            let mut queue = self
                .shared
                .queue
                .lock()
                .expect("audit queue lock poisoned");
            let evicted = if queue.len() >= self.shared.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(event);
            evicted
        };

        if let Some(evicted) = evicted {
            warn!(
                event_type = evicted.kind.as_str(),
                "Audit queue full, dropping oldest event"
            );
        }

        self.shared.notify.notify_one();
    }
}

async fn run_worker(pool: DieselPool, mut drain: AuditDrain) {
    loop {
        let event = drain.recv().await;
        let kind = event.kind;

        let mut conn = match pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(
                    event_type = kind.as_str(),
                    "Audit write skipped, no database connection: {}", e
                );
                continue;
            },
        };

        if let Err(e) = AuditLog::insert(&mut conn, event.into_row()).await {
            error!(
                event_type = kind.as_str(),
                "Failed to persist audit event: {}", e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_enqueues_event() {
        let (journal, mut drain) = AuditJournal::detached(8);
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();

        journal.log(
            AuditEventType::LoginSuccess,
            Some(user),
            Some(tenant),
            Some("10.0.0.1".to_string()),
            Some("curl/8.0".to_string()),
            Some(json!({"device": "cli"})),
        );

        let event = drain.recv().await;
        assert_eq!(event.kind, AuditEventType::LoginSuccess);
        assert_eq!(event.user_id, Some(user));
        assert_eq!(event.tenant_id, Some(tenant));
        assert_eq!(event.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(event.details["device"], "cli");
    }

    #[tokio::test]
    async fn test_missing_details_default_to_empty_map() {
        let (journal, mut drain) = AuditJournal::detached(8);

        journal.log(AuditEventType::Logout, None, None, None, None, None);

        let event = drain.recv().await;
        assert!(event.details.is_object());
        assert_eq!(event.details.as_object().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_oldest_without_blocking() {
        let (journal, mut drain) = AuditJournal::detached(2);

        // Three sends into a depth-2 queue: the FIRST event is evicted to
        // admit the third, and the caller never blocks
        for seq in 0..3 {
            journal.log(
                AuditEventType::LoginFailed,
                None,
                None,
                None,
                None,
                Some(json!({"seq": seq})),
            );
        }

        assert_eq!(drain.try_recv().unwrap().details["seq"], 1);
        assert_eq!(drain.try_recv().unwrap().details["seq"], 2);
        assert!(drain.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_nested_details_round_trip() {
        let (journal, mut drain) = AuditJournal::detached(8);

        let details = json!({
            "scope": "all",
            "revokedCount": 3,
            "nested": {"devices": ["laptop", "phone"], "flag": true}
        });

        journal.log(
            AuditEventType::Logout,
            None,
            None,
            None,
            None,
            Some(details.clone()),
        );

        let event = drain.recv().await;
        assert_eq!(event.details, details);
    }
}
