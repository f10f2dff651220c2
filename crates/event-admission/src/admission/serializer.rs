use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::domain::EventId;

/// Single-writer gate per event.
///
/// Every read-then-write admission sequence holds the event's guard for its whole duration, so
/// two draws (or a draw and a transition) on the same event never interleave. Distinct events do
/// not contend.
#[derive(Debug, Default)]
pub struct EventSerializer {
    gates: DashMap<EventId, Arc<Mutex<()>>>,
}

/// Proof that the holder owns the event's write gate.
#[derive(Debug)]
pub struct EventGuard {
    event_id: EventId,
    _guard: OwnedMutexGuard<()>,
}

impl EventGuard {
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }
}

impl EventSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, event_id: &EventId) -> EventGuard {
        // A gate nobody holds or waits on has only the map's reference.
        self.gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        let gate = self
            .gates
            .entry(event_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        EventGuard {
            event_id: event_id.clone(),
            _guard: gate.lock_owned().await,
        }
    }

    /// Events with a gate currently held or awaited, plus any released since the last acquire.
    pub fn tracked_events(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_event_waits_for_release() {
        let serializer = Arc::new(EventSerializer::new());
        let event = EventId("e1".to_string());
        let first = serializer.acquire(&event).await;

        let contender = {
            let serializer = serializer.clone();
            let event = event.clone();
            tokio::spawn(async move { serializer.acquire(&event).await.event_id().clone() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(first);
        let acquired = contender.await.expect("task joins");
        assert_eq!(acquired, event);
    }

    #[tokio::test]
    async fn distinct_events_do_not_contend() {
        let serializer = EventSerializer::new();
        let _a = serializer.acquire(&EventId("a".to_string())).await;
        let _b = serializer.acquire(&EventId("b".to_string())).await;
        assert_eq!(serializer.tracked_events(), 2);
    }

    #[tokio::test]
    async fn released_gates_are_pruned_on_next_acquire() {
        let serializer = EventSerializer::new();
        drop(serializer.acquire(&EventId("a".to_string())).await);
        let _b = serializer.acquire(&EventId("b".to_string())).await;
        assert_eq!(serializer.tracked_events(), 1);

        let _a = serializer.acquire(&EventId("a".to_string())).await;
        assert_eq!(serializer.tracked_events(), 2);
    }
}
