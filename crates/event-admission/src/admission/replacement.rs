use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::{Store, WriteBatch};

use super::buckets::{load_settings, load_waitlist, WaitlistSnapshot};
use super::domain::{EntrantStatus, EventId, Identifier};
use super::draw::{DrawResult, Shuffler, SkipReason};
use super::error::AdmissionError;
use super::serializer::{EventGuard, EventSerializer};

/// Backfills vacated seats from the remaining waiting pool without re-running the lottery.
pub struct ReplacementEngine<S> {
    store: Arc<S>,
    serializer: Arc<EventSerializer>,
    shuffler: Arc<Shuffler>,
}

impl<S> Clone for ReplacementEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            serializer: self.serializer.clone(),
            shuffler: self.shuffler.clone(),
        }
    }
}

impl<S> ReplacementEngine<S>
where
    S: Store + 'static,
{
    pub fn new(store: Arc<S>, serializer: Arc<EventSerializer>, shuffler: Arc<Shuffler>) -> Self {
        Self {
            store,
            serializer,
            shuffler,
        }
    }

    /// Invite up to `count` more entrants from `WAITING`; anyone left over becomes `UNINVITED`.
    pub async fn pool_replacement(
        &self,
        event_id: &EventId,
        count: usize,
    ) -> Result<DrawResult, AdmissionError> {
        event_id.require()?;
        let guard = self.serializer.acquire(event_id).await;
        self.pool_locked(&guard, count).await
    }

    /// Invite exactly enough entrants to bring `|INVITED| + |ACCEPTED|` back up to capacity.
    pub async fn pool_replacement_auto(
        &self,
        event_id: &EventId,
    ) -> Result<DrawResult, AdmissionError> {
        event_id.require()?;
        let guard = self.serializer.acquire(event_id).await;
        self.auto_locked(&guard).await
    }

    pub(crate) async fn pool_locked(
        &self,
        guard: &EventGuard,
        count: usize,
    ) -> Result<DrawResult, AdmissionError> {
        let event_id = guard.event_id();
        load_settings(self.store.as_ref(), event_id)
            .await?
            .require_active(event_id)?;
        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        self.draw(event_id, &waitlist, count).await
    }

    pub(crate) async fn auto_locked(&self, guard: &EventGuard) -> Result<DrawResult, AdmissionError> {
        let event_id = guard.event_id();
        let settings = load_settings(self.store.as_ref(), event_id).await?;
        let capacity = settings.require_capacity(event_id).map_err(|err| {
            warn!(%event_id, "entrantLimit missing; backfill refused");
            err
        })?;
        settings.require_active(event_id)?;

        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        let seats_taken = waitlist.seats_taken();
        if seats_taken >= capacity as usize {
            debug!(%event_id, seats_taken, capacity, "event already full; no backfill");
            return Ok(DrawResult::Skipped(SkipReason::AtCapacity {
                seats_taken,
                capacity,
            }));
        }

        let deficit = capacity as usize - seats_taken;
        self.draw(event_id, &waitlist, deficit).await
    }

    async fn draw(
        &self,
        event_id: &EventId,
        waitlist: &WaitlistSnapshot,
        count: usize,
    ) -> Result<DrawResult, AdmissionError> {
        let waiting = waitlist.ids(EntrantStatus::Waiting);
        if waiting.is_empty() {
            debug!(%event_id, "waiting list empty; nothing to pool");
            return Ok(DrawResult::Skipped(SkipReason::EmptyWaitingList));
        }

        let outcome = self.shuffler.split(waiting, count);
        let mut batch = WriteBatch::new();
        outcome.write_moves(event_id, &mut batch);
        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;

        info!(
            %event_id,
            requested = count,
            invited = outcome.invited.len(),
            uninvited = outcome.uninvited.len(),
            "replacement pool applied"
        );
        Ok(DrawResult::Applied(outcome))
    }
}
