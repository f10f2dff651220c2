use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::store::WriteBatch;

use super::domain::{EntrantId, EntrantStatus, EventId};
use super::error::AdmissionError;
use super::paths;

/// A requested change to one entrant's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Join,
    Leave,
    Accept,
    Decline,
    Cancel,
    Rejoin,
    Confirm,
    Swap(EntrantStatus),
}

impl Transition {
    /// Resolve the bucket this transition lands in, given the entrant's current bucket.
    ///
    /// `Ok(None)` means the entrant is removed from the event entirely.
    pub fn target(
        self,
        event_id: &EventId,
        current: Option<EntrantStatus>,
    ) -> Result<Option<EntrantStatus>, AdmissionError> {
        use EntrantStatus::*;

        let Some(from) = current else {
            return match self {
                Transition::Join => Ok(Some(Waiting)),
                _ => Err(AdmissionError::NotRegistered {
                    event_id: event_id.clone(),
                }),
            };
        };

        let to = match (self, from) {
            (Transition::Join, status) => {
                return Err(AdmissionError::AlreadyRegistered { status });
            }
            (Transition::Leave, Waiting) => None,
            (Transition::Accept, Invited) => Some(Accepted),
            (Transition::Decline, Invited) => Some(Declined),
            (Transition::Cancel, Invited | Accepted) => Some(Cancelled),
            (Transition::Rejoin, Uninvited) => Some(Waiting),
            (Transition::Confirm, Accepted) => Some(Confirmed),
            (Transition::Swap(status), _) => Some(status),
            (transition, from) => {
                return Err(AdmissionError::IllegalTransition { from, transition });
            }
        };
        Ok(to)
    }

    /// Whether a successful move from `from` to `to` frees a seat the backfill may refill.
    pub fn vacates_seat(self, from: Option<EntrantStatus>, to: Option<EntrantStatus>) -> bool {
        match self {
            Transition::Decline | Transition::Cancel => true,
            Transition::Swap(_) => {
                let held = from.is_some_and(EntrantStatus::holds_seat);
                held && !to.is_some_and(EntrantStatus::holds_seat)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Join => f.write_str("join"),
            Transition::Leave => f.write_str("leave"),
            Transition::Accept => f.write_str("accept"),
            Transition::Decline => f.write_str("decline"),
            Transition::Cancel => f.write_str("cancel"),
            Transition::Rejoin => f.write_str("rejoin"),
            Transition::Confirm => f.write_str("confirm"),
            Transition::Swap(status) => write!(f, "swap to {status}"),
        }
    }
}

impl FromStr for Transition {
    type Err = AdmissionError;

    /// Parses the action names used in routes. `swap` needs a target status and is not parsed here.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "join" => Ok(Transition::Join),
            "leave" => Ok(Transition::Leave),
            "accept" => Ok(Transition::Accept),
            "decline" => Ok(Transition::Decline),
            "cancel" => Ok(Transition::Cancel),
            "rejoin" => Ok(Transition::Rejoin),
            "confirm" => Ok(Transition::Confirm),
            other => Err(AdmissionError::InvalidArgument(format!("unknown action '{other}'"))),
        }
    }
}

/// Builds the single batch for a move: remove the entrant from every bucket it currently
/// occupies, then write the new entry. Clearing all held buckets also heals duplicates.
pub(crate) fn move_batch(
    event_id: &EventId,
    entrant_id: &EntrantId,
    held: &[EntrantStatus],
    target: Option<(EntrantStatus, Value)>,
) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for status in held {
        batch.delete(paths::bucket_entry(event_id, *status, entrant_id));
    }
    if let Some((status, payload)) = target {
        batch.set(paths::bucket_entry(event_id, status, entrant_id), payload);
    }
    batch
}
