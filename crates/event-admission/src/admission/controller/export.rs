use serde_json::Value;
use tracing::info;

use crate::store::Store;

use super::super::domain::{EntrantStatus, EventId, Identifier};
use super::super::error::AdmissionError;
use super::super::paths;
use super::AdmissionController;

const HEADER: [&str; 4] = ["userId", "name", "email", "phone"];
const MISSING: &str = "N/A";

impl<S> AdmissionController<S>
where
    S: Store + 'static,
{
    /// CSV of the event's `ACCEPTED` entrants joined with their `/User` profiles.
    ///
    /// Missing profile fields render as `N/A`; an empty bucket yields only the header row.
    pub async fn export_final_entrants(&self, event_id: &EventId) -> Result<String, AdmissionError> {
        event_id.require()?;
        let accepted = self.entrants(event_id, EntrantStatus::Accepted).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(HEADER)
            .map_err(|err| AdmissionError::Export(err.to_string()))?;

        for entrant_id in &accepted {
            let profile = self
                .store
                .get(&paths::user(entrant_id))
                .await
                .map_err(AdmissionError::read)?;
            let profile = profile.as_ref();
            let phone = field(profile, "phone").or_else(|| field(profile, "phoneNumber"));
            writer
                .write_record([
                    entrant_id.0.as_str(),
                    field(profile, "name").as_deref().unwrap_or(MISSING),
                    field(profile, "email").as_deref().unwrap_or(MISSING),
                    phone.as_deref().unwrap_or(MISSING),
                ])
                .map_err(|err| AdmissionError::Export(err.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| AdmissionError::Export(err.to_string()))?;
        let csv = String::from_utf8(bytes).map_err(|err| AdmissionError::Export(err.to_string()))?;
        info!(%event_id, rows = accepted.len(), "final entrant list exported");
        Ok(csv)
    }
}

/// Non-blank scalar profile field as text.
fn field(profile: Option<&Value>, key: &str) -> Option<String> {
    match profile?.get(key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
