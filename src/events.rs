//! Process-local event bus (C12). Grounded on the teacher's `EventBus`
//! (a `tokio::sync::broadcast` channel wrapping an `Event` enum): same
//! publish/subscribe shape, generalized from device/library lifecycle
//! events to the case-database's deferred-event categories (§4.10).
//!
//! Events are posted only after the owning transaction commits; nothing
//! in this module participates in the commit decision itself.

use tokio::sync::broadcast;

/// A case-level domain event, fired once per occurrence after a
/// transaction commits, in registration order (§4.10, invariant 12).
#[derive(Debug, Clone, PartialEq)]
pub enum CaseEvent {
    /// The aggregate score at `obj_id` changed as a result of an
    /// analysis-result insert or deletion (§4.6). One event is fired per
    /// distinct `obj_id` touched by the transaction, even if several
    /// results inside it affected the same object.
    ScoreChanged { obj_id: i64, data_source_obj_id: i64 },

    /// A new host row was created.
    HostAdded { host_id: i64 },

    /// An OS account was added, had an attribute change, was deleted, or
    /// was merged into another account.
    OsAccountAdded { os_account_obj_id: i64 },
    OsAccountChanged { os_account_obj_id: i64 },
    OsAccountDeleted { os_account_obj_id: i64 },
    OsAccountMerged { source_obj_id: i64, destination_obj_id: i64 },

    /// New timeline events were inserted for a file.
    TimelineEventsAdded { obj_id: i64, count: usize },

    /// An analysis-result artifact was deleted.
    AnalysisResultDeleted { artifact_obj_id: i64 },
}

/// Single process-local publish/subscribe channel (§5, "shared
/// resources"; C12). Lagging subscribers drop the oldest events rather
/// than block a committing writer.
pub struct EventBus {
    sender: broadcast::Sender<CaseEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Post an event. Ignored if there are no subscribers — firing is
    /// best-effort and must never affect the caller (§4.10 step 4).
    pub fn emit(&self, event: CaseEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaseEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_observes_emitted_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(CaseEvent::ScoreChanged { obj_id: 1, data_source_obj_id: 1 });
        let received = rx.recv().await.unwrap();
        assert_eq!(received, CaseEvent::ScoreChanged { obj_id: 1, data_source_obj_id: 1 });
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.emit(CaseEvent::HostAdded { host_id: 1 });
    }
}
