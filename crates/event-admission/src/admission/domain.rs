use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::error::AdmissionError;

/// Identifier types shared by the admission services. Empty or path-breaking ids are rejected
/// before any store access.
pub trait Identifier {
    const KIND: &'static str;

    fn as_str(&self) -> &str;

    fn require(&self) -> Result<&str, AdmissionError> {
        let raw = self.as_str();
        if raw.trim().is_empty() {
            return Err(AdmissionError::InvalidArgument(format!("{} is empty", Self::KIND)));
        }
        if raw.contains('/') {
            return Err(AdmissionError::InvalidArgument(format!(
                "{} '{raw}' contains '/'",
                Self::KIND
            )));
        }
        Ok(raw)
    }
}

/// Event identity as stored under `/Event/{eventId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

/// Entrant (user) identity as stored under the waitlist buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntrantId(pub String);

/// Organizer identity as stored under `/Organizer/{organizerId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganizerId(pub String);

impl Identifier for EventId {
    const KIND: &'static str = "event id";

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Identifier for EntrantId {
    const KIND: &'static str = "entrant id";

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl Identifier for OrganizerId {
    const KIND: &'static str = "organizer id";

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OrganizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of one entrant's relationship to one event. Each variant is also a waitlist bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrantStatus {
    Waiting,
    Invited,
    Accepted,
    Declined,
    Cancelled,
    Uninvited,
    Confirmed,
}

impl EntrantStatus {
    pub const ALL: [EntrantStatus; 7] = [
        EntrantStatus::Waiting,
        EntrantStatus::Invited,
        EntrantStatus::Accepted,
        EntrantStatus::Declined,
        EntrantStatus::Cancelled,
        EntrantStatus::Uninvited,
        EntrantStatus::Confirmed,
    ];

    /// Bucket name used as a path segment under `/WaitingList/{eventId}`.
    pub const fn segment(self) -> &'static str {
        match self {
            EntrantStatus::Waiting => "WAITING",
            EntrantStatus::Invited => "INVITED",
            EntrantStatus::Accepted => "ACCEPTED",
            EntrantStatus::Declined => "DECLINED",
            EntrantStatus::Cancelled => "CANCELLED",
            EntrantStatus::Uninvited => "UNINVITED",
            EntrantStatus::Confirmed => "CONFIRMED",
        }
    }

    pub const fn notification_type(self) -> NotificationType {
        match self {
            EntrantStatus::Waiting => NotificationType::Waiting,
            EntrantStatus::Invited => NotificationType::Invited,
            EntrantStatus::Accepted => NotificationType::Accepted,
            EntrantStatus::Declined => NotificationType::Declined,
            EntrantStatus::Cancelled => NotificationType::Cancelled,
            EntrantStatus::Uninvited => NotificationType::Uninvited,
            EntrantStatus::Confirmed => NotificationType::Confirmed,
        }
    }

    /// Statuses that occupy one of the event's seats.
    pub const fn holds_seat(self) -> bool {
        matches!(self, EntrantStatus::Invited | EntrantStatus::Accepted)
    }
}

impl fmt::Display for EntrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for EntrantStatus {
    type Err = AdmissionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        EntrantStatus::ALL
            .into_iter()
            .find(|status| status.segment() == normalized)
            .ok_or_else(|| AdmissionError::InvalidArgument(format!("unknown status '{raw}'")))
    }
}

/// Category a notification is filed under at `/Notification/{userId}/{scope}/{type}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Waiting,
    Invited,
    Accepted,
    Declined,
    Cancelled,
    Uninvited,
    Confirmed,
    OrganizerBanned,
    OrganizerReinstated,
    EventOnHold,
    EventResumed,
}

impl NotificationType {
    pub const fn segment(self) -> &'static str {
        match self {
            NotificationType::Waiting => "WAITING",
            NotificationType::Invited => "INVITED",
            NotificationType::Accepted => "ACCEPTED",
            NotificationType::Declined => "DECLINED",
            NotificationType::Cancelled => "CANCELLED",
            NotificationType::Uninvited => "UNINVITED",
            NotificationType::Confirmed => "CONFIRMED",
            NotificationType::OrganizerBanned => "ORGANIZER_BANNED",
            NotificationType::OrganizerReinstated => "ORGANIZER_REINSTATED",
            NotificationType::EventOnHold => "EVENT_ON_HOLD",
            NotificationType::EventResumed => "EVENT_RESUMED",
        }
    }
}

/// Coordinates an entrant may attach when joining a waiting list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn validate(self) -> Result<Self, AdmissionError> {
        let in_range = (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);
        if in_range {
            Ok(self)
        } else {
            Err(AdmissionError::InvalidArgument(format!(
                "coordinates ({}, {}) out of range",
                self.latitude, self.longitude
            )))
        }
    }
}

/// Value stored at `/WaitingList/{eventId}/{STATUS}/{entrantId}`.
pub fn bucket_payload(location: Option<GeoPoint>) -> Value {
    match location {
        Some(point) => json!({ "latitude": point.latitude, "longitude": point.longitude }),
        None => Value::Bool(true),
    }
}

/// Recover the coordinates, if any, from a bucket entry.
pub fn payload_location(payload: &Value) -> Option<GeoPoint> {
    serde_json::from_value(payload.clone()).ok()
}

/// Binding of an entrant to an event and its current bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub event_id: EventId,
    pub entrant_id: EntrantId,
    pub status: EntrantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// Date layouts found in event records: ISO dates and the client's `MM-dd-yyyy`.
const EVENT_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m-%d-%Y"];

/// Event fields read from `/Event/{eventId}`. Unknown fields are ignored, and a malformed field
/// reads as absent instead of rejecting the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub organizer: Option<String>,
    #[serde(default, deserialize_with = "lenient_limit")]
    pub entrant_limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub event_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub registration_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub registration_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub on_hold: bool,
}

/// Parse an event date in any accepted layout; blank or unknown text is `None`.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    EVENT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(parse_event_date))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw.as_str().map(str::to_string))
}

fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw.as_bool().unwrap_or(false))
}

impl EventRecord {
    /// Capacity, if present and representable.
    pub fn capacity(&self) -> Option<u32> {
        self.entrant_limit.and_then(|limit| u32::try_from(limit).ok())
    }

    /// True only when the event starts strictly after `today`.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        self.event_start_date.is_some_and(|start| start > today)
    }
}

/// Capabilities carried by a user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Entrant,
    Organizer,
    Admin,
}

impl FromStr for Role {
    type Err = AdmissionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "entrant" => Ok(Role::Entrant),
            "organizer" => Ok(Role::Organizer),
            "admin" => Ok(Role::Admin),
            other => Err(AdmissionError::InvalidArgument(format!("unknown role '{other}'"))),
        }
    }
}

/// A caller identity: a plain id plus role data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub roles: BTreeSet<Role>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn is_organizer(&self) -> bool {
        self.roles.contains(&Role::Organizer)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}
