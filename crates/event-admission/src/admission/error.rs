use crate::store::StoreError;

use super::domain::{EntrantStatus, EventId};
use super::participation::Transition;

/// Error raised by the admission services.
///
/// None of these are retried internally; callers surface them and let the organizer re-trigger
/// the operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("event {event_id} has no usable entrantLimit")]
    MissingConfiguration { event_id: EventId },
    #[error("event {event_id} is on hold")]
    EventOnHold { event_id: EventId },
    #[error("entrant is not on the waiting list for event {event_id}")]
    NotRegistered { event_id: EventId },
    #[error("cannot {transition} from {from}")]
    IllegalTransition {
        from: EntrantStatus,
        transition: Transition,
    },
    #[error("entrant already holds status {status}")]
    AlreadyRegistered { status: EntrantStatus },
    #[error("caller lacks the {required} capability")]
    Forbidden { required: &'static str },
    #[error("store read failed: {0}")]
    StoreRead(StoreError),
    #[error("store write failed: {0}")]
    StoreWrite(StoreError),
    #[error("export failed: {0}")]
    Export(String),
}

impl AdmissionError {
    pub(crate) fn read(error: StoreError) -> Self {
        Self::StoreRead(error)
    }

    pub(crate) fn write(error: StoreError) -> Self {
        Self::StoreWrite(error)
    }
}
