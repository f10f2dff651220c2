use chrono::NaiveDate;
use event_admission::error::AppError;
use event_admission::store::MemoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the in-memory store, preloading a JSON snapshot when a path is configured.
pub(crate) fn load_store(seed_path: Option<&Path>) -> Result<MemoryStore, AppError> {
    let Some(path) = seed_path else {
        return Ok(MemoryStore::new());
    };
    let raw = std::fs::read_to_string(path)?;
    let store = seed_store(&raw)?;
    info!(path = %path.display(), "store seeded from snapshot");
    Ok(store)
}

pub(crate) fn seed_store(raw: &str) -> Result<MemoryStore, AppError> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(MemoryStore::from_value(value))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
