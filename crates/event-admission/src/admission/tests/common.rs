use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::admission::{
    AdmissionController, AdmissionSettings, EntrantId, EntrantStatus, EventId, EventSerializer,
    Shuffler,
};
use crate::store::{MemoryStore, Store, StoreError, StorePath, ValueStream, WriteBatch};

pub(super) const EVENT: &str = "evt-swim";

pub(super) fn event() -> EventId {
    EventId(EVENT.to_string())
}

pub(super) fn entrant(raw: &str) -> EntrantId {
    EntrantId(raw.to_string())
}

pub(super) fn ids(raw: &[&str]) -> Vec<EntrantId> {
    raw.iter().map(|id| entrant(id)).collect()
}

/// `{ "a": true, "b": true }` for a bucket.
pub(super) fn members(raw: &[&str]) -> Value {
    let map: Map<String, Value> = raw
        .iter()
        .map(|id| (id.to_string(), Value::Bool(true)))
        .collect();
    Value::Object(map)
}

/// Store holding one event with the given limit (or none) and bucket contents.
pub(super) fn seeded_store(limit: Option<i64>, buckets: &[(EntrantStatus, &[&str])]) -> MemoryStore {
    let mut event = json!({
        "name": "Community Swim",
        "organizer": "org-1",
        "eventStartDate": "2030-06-01",
    });
    if let Some(limit) = limit {
        event["entrantLimit"] = json!(limit);
    }

    let mut waitlist = Map::new();
    for (status, entrants) in buckets {
        waitlist.insert(status.segment().to_string(), members(entrants));
    }

    MemoryStore::from_value(json!({
        "Event": { EVENT: event },
        "WaitingList": { EVENT: Value::Object(waitlist) },
    }))
}

pub(super) fn controller_with(
    store: Arc<MemoryStore>,
    auto_backfill: bool,
) -> AdmissionController<MemoryStore> {
    AdmissionController::new(
        store,
        Arc::new(EventSerializer::new()),
        Arc::new(Shuffler::seeded(42)),
        AdmissionSettings { auto_backfill },
    )
}

pub(super) fn controller(store: &MemoryStore) -> AdmissionController<MemoryStore> {
    controller_with(Arc::new(store.clone()), false)
}

/// Sorted ids currently in one bucket of the test event.
pub(super) fn bucket(store: &MemoryStore, status: EntrantStatus) -> Vec<String> {
    store
        .snapshot()
        .pointer(&format!("/WaitingList/{EVENT}/{}", status.segment()))
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

pub(super) fn value_at(store: &MemoryStore, pointer: &str) -> Option<Value> {
    store.snapshot().pointer(pointer).cloned()
}

/// Reads pass through; any batch touching a rejected prefix fails as a whole.
pub(super) struct RejectingStore {
    pub inner: MemoryStore,
    pub rejected: Vec<StorePath>,
}

#[async_trait]
impl Store for RejectingStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.get(path).await
    }

    async fn update(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let blocked = batch
            .ops()
            .iter()
            .any(|op| self.rejected.iter().any(|prefix| op.path.starts_with(prefix)));
        if blocked {
            return Err(StoreError::WriteRejected("permission denied".to_string()));
        }
        self.inner.update(batch).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<ValueStream, StoreError> {
        self.inner.subscribe(path).await
    }
}

/// Every call fails as if the backend were unreachable.
pub(super) struct UnavailableStore;

#[async_trait]
impl Store for UnavailableStore {
    async fn get(&self, _path: &StorePath) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn update(&self, _batch: WriteBatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn subscribe(&self, _path: &StorePath) -> Result<ValueStream, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
