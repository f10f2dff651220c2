use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{Store, StoreError, StorePath, ValueStream, WriteBatch};

/// In-process JSON tree implementing [`Store`].
///
/// Batches are applied under one lock, so readers never observe half of a batch. Subscribers
/// are only woken when the subtree they watch actually changed.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    root: Mutex<Value>,
    watchers: Mutex<Vec<Watcher>>,
    batches: AtomicUsize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            watchers: Mutex::new(Vec::new()),
            batches: AtomicUsize::new(0),
        }
    }
}

#[derive(Debug)]
struct Watcher {
    path: StorePath,
    sender: watch::Sender<Option<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tree from an existing JSON document (e.g. an exported database snapshot).
    pub fn from_value(value: Value) -> Self {
        let root = match value {
            Value::Object(_) => value,
            _ => Value::Object(Map::new()),
        };
        let store = Self::default();
        if let Ok(mut guard) = store.inner.root.lock() {
            *guard = root;
        }
        store
    }

    /// Full copy of the current tree.
    pub fn snapshot(&self) -> Value {
        self.inner
            .root
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(Value::Null)
    }

    /// Number of batches applied since construction; seeding does not count.
    pub fn write_count(&self) -> usize {
        self.inner.batches.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .watchers
            .lock()
            .map(|guard| guard.iter().filter(|w| !w.sender.is_closed()).count())
            .unwrap_or(0)
    }

    fn root(&self) -> Result<MutexGuard<'_, Value>, StoreError> {
        self.inner
            .root
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Refreshes watchers whose subtree overlaps a written path.
    fn notify(&self, root: &Value, written: &[StorePath]) -> Result<(), StoreError> {
        let mut watchers = self
            .inner
            .watchers
            .lock()
            .map_err(|_| StoreError::Unavailable("watcher lock poisoned".to_string()))?;
        watchers.retain(|watcher| !watcher.sender.is_closed());
        let touched = |watched: &StorePath| {
            written
                .iter()
                .any(|path| path.starts_with(watched) || watched.starts_with(path))
        };
        for watcher in watchers.iter().filter(|watcher| touched(&watcher.path)) {
            let next = value_at(root, &watcher.path).cloned();
            watcher.sender.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let root = self.root()?;
        Ok(value_at(&root, path).cloned())
    }

    async fn update(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut root = self.root()?;
        let written: Vec<StorePath> = batch.ops().iter().map(|op| op.path.clone()).collect();
        for op in batch.into_ops() {
            match op.value {
                Some(Value::Null) | None => remove_at(&mut root, &op.path),
                Some(value) => set_at(&mut root, &op.path, value),
            }
        }
        self.inner.batches.fetch_add(1, Ordering::SeqCst);
        self.notify(&root, &written)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<ValueStream, StoreError> {
        let receiver = {
            let root = self.root()?;
            let (sender, receiver) = watch::channel(value_at(&root, path).cloned());
            let mut watchers = self
                .inner
                .watchers
                .lock()
                .map_err(|_| StoreError::Unavailable("watcher lock poisoned".to_string()))?;
            watchers.push(Watcher {
                path: path.clone(),
                sender,
            });
            receiver
        };

        let stream = futures::stream::unfold((receiver, true), |(mut receiver, first)| async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let value = receiver.borrow_and_update().clone();
            Some((Ok(value), (receiver, false)))
        });
        Ok(stream.boxed())
    }
}

fn value_at<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn set_at(root: &mut Value, path: &StorePath, value: Value) {
    let mut node = root;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *node = value;
}

fn remove_at(root: &mut Value, path: &StorePath) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        match node.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).expect("valid path")
    }

    #[tokio::test]
    async fn batch_sets_and_deletes_in_order() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set(path("/WaitingList/e1/WAITING/u1"), json!(true))
            .set(path("/WaitingList/e1/WAITING/u2"), json!(true))
            .delete(path("/WaitingList/e1/WAITING/u1"));
        store.update(batch).await.expect("update applies");

        let waiting = store
            .get(&path("/WaitingList/e1/WAITING"))
            .await
            .expect("read succeeds");
        assert_eq!(waiting, Some(json!({ "u2": true })));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn deleting_last_child_keeps_parent_node() {
        let store = MemoryStore::from_value(json!({
            "WaitingList": { "e1": { "WAITING": { "u1": true } } }
        }));
        let mut batch = WriteBatch::new();
        batch.delete(path("/WaitingList/e1/WAITING/u1"));
        store.update(batch).await.expect("update applies");

        let waiting = store
            .get(&path("/WaitingList/e1/WAITING"))
            .await
            .expect("read succeeds");
        assert_eq!(waiting, Some(json!({})));
    }

    #[tokio::test]
    async fn empty_batch_is_not_counted() {
        let store = MemoryStore::new();
        store.update(WriteBatch::new()).await.expect("no-op");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn subscription_delivers_current_then_changes_only() {
        let store = MemoryStore::new();
        let mut stream = store
            .subscribe(&path("/WaitingList/e1/INVITED"))
            .await
            .expect("subscribe");
        assert_eq!(stream.next().await, Some(Ok(None)));

        let mut unrelated = WriteBatch::new();
        unrelated.set(path("/Event/e1/entrantLimit"), json!(3));
        store.update(unrelated).await.expect("update");

        let mut related = WriteBatch::new();
        related.set(path("/WaitingList/e1/INVITED/u1"), json!(true));
        store.update(related).await.expect("update");

        assert_eq!(stream.next().await, Some(Ok(Some(json!({ "u1": true })))));
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let store = MemoryStore::new();
        let stream = store.subscribe(&path("/Event")).await.expect("subscribe");
        assert_eq!(store.subscriber_count(), 1);
        drop(stream);

        let mut batch = WriteBatch::new();
        batch.set(path("/Event/e1/entrantLimit"), json!(1));
        store.update(batch).await.expect("update");
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn ancestor_writes_reach_nested_subscriptions() {
        let store = MemoryStore::from_value(json!({
            "Event": { "e1": { "onHold": false } }
        }));
        let mut stream = store
            .subscribe(&path("/Event/e1/onHold"))
            .await
            .expect("subscribe");
        assert_eq!(stream.next().await, Some(Ok(Some(json!(false)))));

        let mut batch = WriteBatch::new();
        batch.set(path("/Event/e1"), json!({ "onHold": true, "entrantLimit": 2 }));
        store.update(batch).await.expect("update");

        assert_eq!(stream.next().await, Some(Ok(Some(json!(true)))));
    }
}
