//! Store path scheme shared with the mobile client and the notification dispatcher.

use crate::store::StorePath;

use super::domain::{EntrantId, EntrantStatus, EventId, NotificationType, OrganizerId};

pub const EVENT_ROOT: &str = "Event";
pub const WAITING_LIST_ROOT: &str = "WaitingList";
pub const NOTIFICATION_ROOT: &str = "Notification";
pub const ORGANIZER_ROOT: &str = "Organizer";
pub const USER_ROOT: &str = "User";

/// Scope used in place of an event id for account-level notices.
pub const SYSTEM_SCOPE: &str = "SYSTEM";

pub fn events() -> StorePath {
    StorePath::root(EVENT_ROOT)
}

pub fn event(event_id: &EventId) -> StorePath {
    events().child(event_id.0.as_str())
}

pub fn event_on_hold(event_id: &EventId) -> StorePath {
    event(event_id).child("onHold")
}

pub fn waitlist(event_id: &EventId) -> StorePath {
    StorePath::root(WAITING_LIST_ROOT).child(event_id.0.as_str())
}

pub fn bucket(event_id: &EventId, status: EntrantStatus) -> StorePath {
    waitlist(event_id).child(status.segment())
}

pub fn bucket_entry(event_id: &EventId, status: EntrantStatus, entrant_id: &EntrantId) -> StorePath {
    bucket(event_id, status).child(entrant_id.0.as_str())
}

pub fn notification(
    user_id: &str,
    event_id: &EventId,
    notification_type: NotificationType,
) -> StorePath {
    StorePath::root(NOTIFICATION_ROOT)
        .child(user_id)
        .child(event_id.0.as_str())
        .child(notification_type.segment())
}

pub fn system_notification(user_id: &str, notification_type: NotificationType) -> StorePath {
    StorePath::root(NOTIFICATION_ROOT)
        .child(user_id)
        .child(SYSTEM_SCOPE)
        .child(notification_type.segment())
}

pub fn organizer(organizer_id: &OrganizerId) -> StorePath {
    StorePath::root(ORGANIZER_ROOT).child(organizer_id.0.as_str())
}

pub fn organizer_ban_flag(organizer_id: &OrganizerId) -> StorePath {
    organizer(organizer_id).child("bannedFromOrganizer")
}

pub fn organizer_ban_reason(organizer_id: &OrganizerId) -> StorePath {
    organizer(organizer_id).child("banReason")
}

pub fn user(user_id: &EntrantId) -> StorePath {
    StorePath::root(USER_ROOT).child(user_id.0.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_paths_follow_waitlist_scheme() {
        let event = EventId("evt-9".to_string());
        let entrant = EntrantId("dev-42".to_string());
        assert_eq!(
            bucket_entry(&event, EntrantStatus::Uninvited, &entrant).to_string(),
            "/WaitingList/evt-9/UNINVITED/dev-42"
        );
        assert_eq!(event_on_hold(&event).to_string(), "/Event/evt-9/onHold");
    }

    #[test]
    fn notification_paths_are_scoped_by_event_or_system() {
        let event = EventId("evt-9".to_string());
        assert_eq!(
            notification("dev-42", &event, NotificationType::Invited).to_string(),
            "/Notification/dev-42/evt-9/INVITED"
        );
        assert_eq!(
            system_notification("org-1", NotificationType::OrganizerBanned).to_string(),
            "/Notification/org-1/SYSTEM/ORGANIZER_BANNED"
        );
    }
}
