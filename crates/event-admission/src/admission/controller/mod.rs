//! Organizer, entrant, and admin operations composed over the lottery and replacement engines.

mod export;
mod moderation;
mod notify;

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::Store;

use super::buckets::{bucket_ids, load_settings, load_waitlist};
use super::domain::{
    bucket_payload, payload_location, EntrantId, EntrantStatus, EventId, GeoPoint, Identifier,
    Participation,
};
use super::draw::{DrawResult, Shuffler};
use super::error::AdmissionError;
use super::lottery::LotterySelector;
use super::participation::{move_batch, Transition};
use super::paths;
use super::replacement::ReplacementEngine;
use super::serializer::EventSerializer;

pub use moderation::{ModerationReport, DEFAULT_BAN_REASON};
pub use notify::{FailedDelivery, NotificationReport};

/// Live entrant listing: the full id list of one bucket after every remote change.
pub type EntrantStream = BoxStream<'static, Result<Vec<EntrantId>, AdmissionError>>;

/// Runtime switches for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSettings {
    /// Refill vacated seats from `WAITING` right after a decline or cancel.
    pub auto_backfill: bool,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            auto_backfill: true,
        }
    }
}

/// Result of a single status transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionReceipt {
    pub event_id: EventId,
    pub entrant_id: EntrantId,
    pub transition: Transition,
    pub from: Option<EntrantStatus>,
    pub to: Option<EntrantStatus>,
    /// Present when the transition freed a seat and backfill ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfill: Option<DrawResult>,
}

/// Service composing the per-event serializer, the draw engines, and the injected store.
pub struct AdmissionController<S> {
    store: Arc<S>,
    serializer: Arc<EventSerializer>,
    lottery: LotterySelector<S>,
    settings: AdmissionSettings,
}

impl<S> AdmissionController<S>
where
    S: Store + 'static,
{
    pub fn new(
        store: Arc<S>,
        serializer: Arc<EventSerializer>,
        shuffler: Arc<Shuffler>,
        settings: AdmissionSettings,
    ) -> Self {
        let lottery = LotterySelector::new(store.clone(), serializer.clone(), shuffler);
        Self {
            store,
            serializer,
            lottery,
            settings,
        }
    }

    /// Controller with its own serializer and an entropy-seeded shuffler.
    pub fn in_process(store: Arc<S>, settings: AdmissionSettings) -> Self {
        Self::new(
            store,
            Arc::new(EventSerializer::new()),
            Arc::new(Shuffler::from_entropy()),
            settings,
        )
    }

    pub fn lottery(&self) -> &LotterySelector<S> {
        &self.lottery
    }

    pub fn replacement(&self) -> &ReplacementEngine<S> {
        self.lottery.replacement()
    }

    pub fn settings(&self) -> AdmissionSettings {
        self.settings
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn join_waiting_list(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
        location: Option<GeoPoint>,
    ) -> Result<TransitionReceipt, AdmissionError> {
        let location = location.map(GeoPoint::validate).transpose()?;
        self.transition(event_id, entrant_id, Transition::Join, location)
            .await
    }

    pub async fn leave_waiting_list(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Leave, None)
            .await
    }

    pub async fn accept_invitation(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Accept, None)
            .await
    }

    pub async fn decline_invitation(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Decline, None)
            .await
    }

    /// Organizer removes an invited or accepted entrant.
    pub async fn cancel_entrant(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Cancel, None)
            .await
    }

    /// Move an `UNINVITED` entrant back to `WAITING`. Any other status is refused unchanged.
    pub async fn rejoin_waiting_list(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
        location: Option<GeoPoint>,
    ) -> Result<TransitionReceipt, AdmissionError> {
        let location = location.map(GeoPoint::validate).transpose()?;
        self.transition(event_id, entrant_id, Transition::Rejoin, location)
            .await
    }

    pub async fn confirm_attendance(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Confirm, None)
            .await
    }

    /// Organizer override into any bucket. Stored coordinates are not carried over.
    pub async fn swap_status(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
        status: EntrantStatus,
    ) -> Result<TransitionReceipt, AdmissionError> {
        self.transition(event_id, entrant_id, Transition::Swap(status), None)
            .await
    }

    /// Current participation, or `None` when the entrant holds no bucket for the event.
    pub async fn status_of(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
    ) -> Result<Option<Participation>, AdmissionError> {
        event_id.require()?;
        entrant_id.require()?;
        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        Ok(waitlist.status_of(entrant_id).map(|status| Participation {
            event_id: event_id.clone(),
            entrant_id: entrant_id.clone(),
            status,
            location: waitlist
                .payload(status, entrant_id)
                .and_then(payload_location),
        }))
    }

    /// One-shot read of a bucket's ids.
    pub async fn entrants(
        &self,
        event_id: &EventId,
        status: EntrantStatus,
    ) -> Result<Vec<EntrantId>, AdmissionError> {
        event_id.require()?;
        let value = self
            .store
            .get(&paths::bucket(event_id, status))
            .await
            .map_err(AdmissionError::read)?;
        Ok(bucket_ids(value.as_ref()))
    }

    /// Subscribe to a bucket. The stream yields the full id list now and after every change,
    /// and ends its store subscription when dropped.
    pub async fn list_entrants(
        &self,
        event_id: &EventId,
        status: EntrantStatus,
    ) -> Result<EntrantStream, AdmissionError> {
        event_id.require()?;
        let updates = self
            .store
            .subscribe(&paths::bucket(event_id, status))
            .await
            .map_err(AdmissionError::read)?;
        Ok(updates
            .map(|update| {
                update
                    .map(|value| bucket_ids(value.as_ref()))
                    .map_err(AdmissionError::read)
            })
            .boxed())
    }

    async fn transition(
        &self,
        event_id: &EventId,
        entrant_id: &EntrantId,
        transition: Transition,
        location: Option<GeoPoint>,
    ) -> Result<TransitionReceipt, AdmissionError> {
        event_id.require()?;
        entrant_id.require()?;

        let guard = self.serializer.acquire(event_id).await;
        if transition == Transition::Join {
            load_settings(self.store.as_ref(), event_id)
                .await?
                .require_active(event_id)?;
        }

        let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
        let held = waitlist.statuses_of(entrant_id);
        if held.len() > 1 {
            warn!(%event_id, %entrant_id, buckets = ?held, "entrant held in several buckets; healing");
        }
        let from = held.first().copied();
        let to = transition.target(event_id, from).map_err(|err| {
            debug!(%event_id, %entrant_id, %transition, error = %err, "transition refused");
            err
        })?;

        let batch = move_batch(
            event_id,
            entrant_id,
            &held,
            to.map(|status| (status, bucket_payload(location))),
        );
        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;
        info!(%event_id, %entrant_id, %transition, ?from, ?to, "entrant moved");

        let backfill = if transition.vacates_seat(from, to) && self.settings.auto_backfill {
            match self.replacement().auto_locked(&guard).await {
                Ok(result) => Some(result),
                Err(error) => {
                    warn!(%event_id, %error, "automatic backfill failed; seat left open");
                    None
                }
            }
        } else {
            None
        };

        Ok(TransitionReceipt {
            event_id: event_id.clone(),
            entrant_id: entrant_id.clone(),
            transition,
            from,
            to,
            backfill,
        })
    }
}
