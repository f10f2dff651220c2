use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::{Store, WriteBatch};

use super::buckets::{load_settings, load_waitlist};
use super::domain::{EntrantStatus, EventId, Identifier};
use super::draw::{DrawResult, Shuffler, SkipReason};
use super::error::AdmissionError;
use super::paths;
use super::replacement::ReplacementEngine;
use super::serializer::{EventGuard, EventSerializer};

/// Draws the initial invite list for an event from its `WAITING` bucket.
pub struct LotterySelector<S> {
    store: Arc<S>,
    serializer: Arc<EventSerializer>,
    shuffler: Arc<Shuffler>,
    replacement: ReplacementEngine<S>,
}

impl<S> Clone for LotterySelector<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            serializer: self.serializer.clone(),
            shuffler: self.shuffler.clone(),
            replacement: self.replacement.clone(),
        }
    }
}

impl<S> LotterySelector<S>
where
    S: Store + 'static,
{
    pub fn new(store: Arc<S>, serializer: Arc<EventSerializer>, shuffler: Arc<Shuffler>) -> Self {
        let replacement = ReplacementEngine::new(store.clone(), serializer.clone(), shuffler.clone());
        Self {
            store,
            serializer,
            shuffler,
            replacement,
        }
    }

    /// Run the full lottery: clear stale `INVITED`/`UNINVITED` results, then split `WAITING`
    /// into `min(limit, |WAITING|)` invitees and the uninvited remainder. One batched write.
    pub async fn run_lottery(&self, event_id: &EventId) -> Result<DrawResult, AdmissionError> {
        event_id.require()?;
        let guard = self.serializer.acquire(event_id).await;
        self.run_locked(&guard).await
    }

    /// Run the lottery if no draw has happened yet for this event, otherwise backfill.
    pub async fn draw_or_pool(&self, event_id: &EventId) -> Result<DrawResult, AdmissionError> {
        event_id.require()?;
        let guard = self.serializer.acquire(event_id).await;
        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        let already_drawn = EntrantStatus::ALL
            .into_iter()
            .filter(|status| *status != EntrantStatus::Waiting)
            .any(|status| waitlist.count(status) > 0);

        if already_drawn {
            info!(%event_id, "initial lottery already ran; pooling replacements");
            self.replacement.auto_locked(&guard).await
        } else {
            info!(%event_id, "initial lottery has not run; drawing");
            self.run_locked(&guard).await
        }
    }

    pub fn replacement(&self) -> &ReplacementEngine<S> {
        &self.replacement
    }

    async fn run_locked(&self, guard: &EventGuard) -> Result<DrawResult, AdmissionError> {
        let event_id = guard.event_id();
        let settings = load_settings(self.store.as_ref(), event_id).await?;
        let capacity = settings.require_capacity(event_id).map_err(|err| {
            warn!(%event_id, "no entrantLimit configured; lottery aborted");
            err
        })?;
        settings.require_active(event_id)?;

        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        let waiting = waitlist.ids(EntrantStatus::Waiting);
        if waiting.is_empty() {
            debug!(%event_id, "waiting list empty; nothing to draw");
            return Ok(DrawResult::Skipped(SkipReason::EmptyWaitingList));
        }
        if capacity == 0 {
            warn!(%event_id, "entrantLimit is 0; every entrant becomes uninvited");
        }

        let outcome = self.shuffler.split(waiting, capacity as usize);

        let mut batch = WriteBatch::new();
        let stale = [EntrantStatus::Invited, EntrantStatus::Uninvited];
        let mut cleared = 0usize;
        for status in stale {
            for entrant_id in waitlist.ids(status) {
                batch.delete(paths::bucket_entry(event_id, status, &entrant_id));
                cleared += 1;
            }
        }
        outcome.write_moves(event_id, &mut batch);

        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;

        info!(
            %event_id,
            capacity,
            invited = outcome.invited.len(),
            uninvited = outcome.uninvited.len(),
            cleared,
            "lottery applied"
        );
        Ok(DrawResult::Applied(outcome))
    }
}
