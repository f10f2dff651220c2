use std::fmt;

use serde::{Deserialize, Serialize};

/// Slash-separated address of a node in the hierarchical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Parse a `/A/b/c` style string; empty segments are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self(segments))
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
