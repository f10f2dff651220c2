//! Capacity-bounded admission control for event waiting lists.
//!
//! Entrants move between per-status buckets under `/WaitingList/{eventId}`. The lottery draws the
//! initial invite list, the replacement engine refills seats as entrants drop out, and the
//! controller exposes the entrant, organizer, and admin operations. Every read-then-write sequence
//! on an event runs under that event's [`EventSerializer`] gate and commits as one batch.

pub(crate) mod buckets;
pub mod controller;
pub mod domain;
pub mod draw;
pub mod error;
pub mod lottery;
pub mod participation;
pub mod paths;
pub mod replacement;
pub mod router;
pub mod serializer;

#[cfg(test)]
mod tests;

pub use buckets::{EventSettings, WaitlistSnapshot};
pub use controller::{
    AdmissionController, AdmissionSettings, EntrantStream, FailedDelivery, ModerationReport,
    NotificationReport, TransitionReceipt, DEFAULT_BAN_REASON,
};
pub use domain::{
    EntrantId, EntrantStatus, EventId, EventRecord, GeoPoint, Identifier, NotificationType,
    OrganizerId, Participation, Role, UserIdentity,
};
pub use draw::{DrawOutcome, DrawResult, Shuffler, SkipReason};
pub use error::AdmissionError;
pub use lottery::LotterySelector;
pub use participation::Transition;
pub use replacement::ReplacementEngine;
pub use router::admission_router;
pub use serializer::{EventGuard, EventSerializer};
