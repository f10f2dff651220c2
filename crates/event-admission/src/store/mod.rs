//! Hierarchical key/value store abstraction consumed by the admission workflows.
//!
//! The remote backend is an external collaborator; everything in this crate reaches it through
//! the [`Store`] trait so services can be exercised against [`MemoryStore`] in tests and demos.

mod memory;
mod path;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

pub use memory::MemoryStore;
pub use path::StorePath;

/// Live view of a single path: the current value first, then one item per remote change.
pub type ValueStream = BoxStream<'static, Result<Option<Value>, StoreError>>;

/// Storage abstraction so the admission services can be exercised in isolation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Point read of the subtree rooted at `path`.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Apply every write in the batch as a single unit.
    async fn update(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Subscribe to the subtree rooted at `path`.
    async fn subscribe(&self, path: &StorePath) -> Result<ValueStream, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("read of {path} cancelled: {reason}")]
    ReadCancelled { path: String, reason: String },
    #[error("write rejected: {0}")]
    WriteRejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A single mutation: `Some` sets the node, `None` removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub path: StorePath,
    pub value: Option<Value>,
}

/// Multi-path update applied in insertion order; a later op on the same path wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: StorePath, value: Value) -> &mut Self {
        self.ops.push(WriteOp {
            path,
            value: Some(value),
        });
        self
    }

    pub fn delete(&mut self, path: StorePath) -> &mut Self {
        self.ops.push(WriteOp { path, value: None });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Keys of an object node, sorted. Missing and `null` nodes have no children.
pub fn child_keys(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
