//! Realtime JSON-tree store abstraction with an in-process implementation and a
//! REST/event-stream adapter for hosted realtime databases.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

mod firebase;
mod memory;
pub mod sse;
pub mod tree;

pub use firebase::FirebaseRestStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Live listener on one store path.
///
/// Each item is the full value at the path, `None` meaning the path is absent.
/// The first item is the value at subscription time. The stream ends (`next`
/// returns `None`) once the store drops the listener.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: String,
    updates: mpsc::UnboundedReceiver<Option<Value>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        path: impl Into<String>,
        updates: mpsc::UnboundedReceiver<Option<Value>>,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            updates,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.updates.recv().await
    }
}

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    async fn subscribe(&self, path: &str) -> Result<Subscription>;
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
    async fn read_once(&self, path: &str) -> Result<Option<Value>>;
    /// Shallow multi-key write at `path`; a `null` value deletes that child.
    async fn update(&self, path: &str, patch: Map<String, Value>) -> Result<()>;
}
