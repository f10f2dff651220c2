use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::store::{Store, WriteBatch};

use super::super::buckets::load_waitlist;
use super::super::domain::{
    EventId, EventRecord, Identifier, NotificationType, OrganizerId, UserIdentity,
};
use super::super::error::AdmissionError;
use super::super::paths;
use super::notify::{NotificationReport, Outgoing};
use super::AdmissionController;

pub const DEFAULT_BAN_REASON: &str = "Organizer violated policy";

/// What a ban or reinstatement changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationReport {
    pub organizer_id: OrganizerId,
    pub banned: bool,
    /// Events whose hold flag was flipped by this action.
    pub affected_events: Vec<EventId>,
    pub notifications: NotificationReport,
}

impl<S> AdmissionController<S>
where
    S: Store + 'static,
{
    /// Ban an organizer: flag the profile, hold every event starting after `today`, and notify
    /// the organizer plus each entrant of a held event. Flag and holds are one batch.
    pub async fn ban_user_from_organizer(
        &self,
        actor: &UserIdentity,
        organizer_id: &OrganizerId,
        reason: Option<&str>,
        today: NaiveDate,
    ) -> Result<ModerationReport, AdmissionError> {
        require_admin(actor)?;
        organizer_id.require()?;
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_BAN_REASON);

        let held: Vec<EventId> = self
            .organizer_events(organizer_id)
            .await?
            .into_iter()
            .filter(|(_, record)| record.is_future(today))
            .map(|(event_id, _)| event_id)
            .collect();

        let mut batch = WriteBatch::new();
        batch
            .set(paths::organizer_ban_flag(organizer_id), Value::Bool(true))
            .set(paths::organizer_ban_reason(organizer_id), json!(reason));
        for event_id in &held {
            batch.set(paths::event_on_hold(event_id), Value::Bool(true));
        }
        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;

        let organizer_notice = format!("Your organizer privileges have been revoked: {reason}");
        let entrant_notice =
            "This event is on hold while the organizer's account is under review.".to_string();
        let notifications = self
            .notify_moderation(
                organizer_id,
                &held,
                (NotificationType::OrganizerBanned, organizer_notice),
                (NotificationType::EventOnHold, entrant_notice),
            )
            .await?;

        info!(
            %organizer_id,
            actor = %actor.user_id,
            held_events = held.len(),
            notified = notifications.delivered.len(),
            "organizer banned"
        );
        Ok(ModerationReport {
            organizer_id: organizer_id.clone(),
            banned: true,
            affected_events: held,
            notifications,
        })
    }

    /// Lift a ban: clear the flag, release holds on the organizer's future events, and notify.
    pub async fn unban_user_from_organizer(
        &self,
        actor: &UserIdentity,
        organizer_id: &OrganizerId,
        today: NaiveDate,
    ) -> Result<ModerationReport, AdmissionError> {
        require_admin(actor)?;
        organizer_id.require()?;

        let released: Vec<EventId> = self
            .organizer_events(organizer_id)
            .await?
            .into_iter()
            .filter(|(_, record)| record.on_hold && record.is_future(today))
            .map(|(event_id, _)| event_id)
            .collect();

        let mut batch = WriteBatch::new();
        batch
            .set(paths::organizer_ban_flag(organizer_id), Value::Bool(false))
            .delete(paths::organizer_ban_reason(organizer_id));
        for event_id in &released {
            batch.set(paths::event_on_hold(event_id), Value::Bool(false));
        }
        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;

        let notifications = self
            .notify_moderation(
                organizer_id,
                &released,
                (
                    NotificationType::OrganizerReinstated,
                    "Your organizer privileges have been restored.".to_string(),
                ),
                (
                    NotificationType::EventResumed,
                    "This event is open again.".to_string(),
                ),
            )
            .await?;

        info!(
            %organizer_id,
            actor = %actor.user_id,
            released_events = released.len(),
            "organizer reinstated"
        );
        Ok(ModerationReport {
            organizer_id: organizer_id.clone(),
            banned: false,
            affected_events: released,
            notifications,
        })
    }

    /// Remove `/Organizer/{organizerId}`. Events and waitlists are left untouched.
    pub async fn delete_organizer_profile(
        &self,
        actor: &UserIdentity,
        organizer_id: &OrganizerId,
    ) -> Result<(), AdmissionError> {
        require_admin(actor)?;
        organizer_id.require()?;
        let mut batch = WriteBatch::new();
        batch.delete(paths::organizer(organizer_id));
        self.store
            .update(batch)
            .await
            .map_err(AdmissionError::write)?;
        info!(%organizer_id, actor = %actor.user_id, "organizer profile deleted");
        Ok(())
    }

    /// Every event whose `organizer` field names this organizer.
    async fn organizer_events(
        &self,
        organizer_id: &OrganizerId,
    ) -> Result<Vec<(EventId, EventRecord)>, AdmissionError> {
        let events = self
            .store
            .get(&paths::events())
            .await
            .map_err(AdmissionError::read)?;
        let Some(Value::Object(events)) = events else {
            return Ok(Vec::new());
        };

        let mut owned = Vec::new();
        for (event_id, raw) in events {
            let record: EventRecord = match serde_json::from_value(raw) {
                Ok(record) => record,
                Err(error) => {
                    warn!(%event_id, %error, "skipping unreadable event record");
                    continue;
                }
            };
            if record.organizer.as_deref() == Some(organizer_id.0.as_str()) {
                owned.push((EventId(event_id), record));
            }
        }
        Ok(owned)
    }

    async fn notify_moderation(
        &self,
        organizer_id: &OrganizerId,
        events: &[EventId],
        organizer_notice: (NotificationType, String),
        entrant_notice: (NotificationType, String),
    ) -> Result<NotificationReport, AdmissionError> {
        let (organizer_type, organizer_message) = organizer_notice;
        let (entrant_type, entrant_message) = entrant_notice;

        let mut outgoing = vec![Outgoing {
            recipient: organizer_id.0.clone(),
            path: paths::system_notification(&organizer_id.0, organizer_type),
            message: organizer_message,
        }];
        for event_id in events {
            let waitlist = load_waitlist(self.store.as_ref(), event_id).await?;
            outgoing.extend(waitlist.entrants().into_iter().map(|entrant_id| Outgoing {
                path: paths::notification(&entrant_id.0, event_id, entrant_type),
                recipient: entrant_id.0,
                message: entrant_message.clone(),
            }));
        }

        Ok(self.deliver(outgoing).await)
    }
}

fn require_admin(actor: &UserIdentity) -> Result<(), AdmissionError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AdmissionError::Forbidden { required: "admin" })
    }
}
