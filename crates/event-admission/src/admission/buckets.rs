use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::store::Store;

use super::domain::{EntrantId, EntrantStatus, EventId};
use super::error::AdmissionError;
use super::paths;

/// Point-in-time copy of every bucket under `/WaitingList/{eventId}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaitlistSnapshot {
    buckets: BTreeMap<EntrantStatus, BTreeMap<EntrantId, Value>>,
}

impl WaitlistSnapshot {
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut buckets = BTreeMap::new();
        let Some(Value::Object(by_status)) = value else {
            return Self { buckets };
        };

        for (segment, entries) in by_status {
            let Ok(status) = segment.parse::<EntrantStatus>() else {
                debug!(bucket = %segment, "ignoring unknown waitlist bucket");
                continue;
            };
            let members: BTreeMap<EntrantId, Value> = match entries {
                Value::Object(map) => map
                    .iter()
                    .map(|(id, payload)| (EntrantId(id.clone()), payload.clone()))
                    .collect(),
                _ => BTreeMap::new(),
            };
            buckets.insert(status, members);
        }
        Self { buckets }
    }

    pub fn ids(&self, status: EntrantStatus) -> Vec<EntrantId> {
        self.buckets
            .get(&status)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, status: EntrantStatus) -> usize {
        self.buckets.get(&status).map_or(0, BTreeMap::len)
    }

    pub fn payload(&self, status: EntrantStatus, entrant_id: &EntrantId) -> Option<&Value> {
        self.buckets.get(&status)?.get(entrant_id)
    }

    /// Every bucket holding the entrant. More than one means earlier writes left a duplicate.
    pub fn statuses_of(&self, entrant_id: &EntrantId) -> Vec<EntrantStatus> {
        EntrantStatus::ALL
            .into_iter()
            .filter(|status| self.payload(*status, entrant_id).is_some())
            .collect()
    }

    pub fn status_of(&self, entrant_id: &EntrantId) -> Option<EntrantStatus> {
        self.statuses_of(entrant_id).into_iter().next()
    }

    /// `|INVITED| + |ACCEPTED|`.
    pub fn seats_taken(&self) -> usize {
        EntrantStatus::ALL
            .into_iter()
            .filter(|status| status.holds_seat())
            .map(|status| self.count(status))
            .sum()
    }

    pub fn entrants(&self) -> BTreeSet<EntrantId> {
        self.buckets
            .values()
            .flat_map(|members| members.keys().cloned())
            .collect()
    }
}

/// Capacity and hold flag read from `/Event/{eventId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSettings {
    pub capacity: Option<u32>,
    pub on_hold: bool,
}

impl EventSettings {
    pub fn from_value(value: Option<&Value>) -> Self {
        let capacity = value
            .and_then(|event| event.get("entrantLimit"))
            .and_then(Value::as_u64)
            .and_then(|limit| u32::try_from(limit).ok());
        let on_hold = value
            .and_then(|event| event.get("onHold"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self { capacity, on_hold }
    }

    /// Capacity is mandatory for every draw; a missing or negative limit aborts the operation.
    pub fn require_capacity(&self, event_id: &EventId) -> Result<u32, AdmissionError> {
        self.capacity
            .ok_or_else(|| AdmissionError::MissingConfiguration {
                event_id: event_id.clone(),
            })
    }

    pub fn require_active(&self, event_id: &EventId) -> Result<(), AdmissionError> {
        if self.on_hold {
            Err(AdmissionError::EventOnHold {
                event_id: event_id.clone(),
            })
        } else {
            Ok(())
        }
    }
}

pub async fn load_waitlist<S>(store: &S, event_id: &EventId) -> Result<WaitlistSnapshot, AdmissionError>
where
    S: Store + ?Sized,
{
    let value = store
        .get(&paths::waitlist(event_id))
        .await
        .map_err(AdmissionError::read)?;
    Ok(WaitlistSnapshot::from_value(value.as_ref()))
}

pub async fn load_settings<S>(store: &S, event_id: &EventId) -> Result<EventSettings, AdmissionError>
where
    S: Store + ?Sized,
{
    let value = store
        .get(&paths::event(event_id))
        .await
        .map_err(AdmissionError::read)?;
    Ok(EventSettings::from_value(value.as_ref()))
}

/// Sorted ids held in one bucket.
pub fn bucket_ids(value: Option<&Value>) -> Vec<EntrantId> {
    crate::store::child_keys(value)
        .into_iter()
        .map(EntrantId)
        .collect()
}
