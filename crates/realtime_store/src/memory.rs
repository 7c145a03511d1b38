use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::{
    tree::{get_at, merge_at, set_at, split_path},
    RealtimeStore, Subscription, SubscriptionId,
};

/// In-process realtime store. Listeners are notified only when the value under
/// their path actually changed.
pub struct MemoryStore {
    inner: Mutex<MemoryStoreState>,
}

struct MemoryStoreState {
    root: Value,
    next_subscription: u64,
    listeners: HashMap<SubscriptionId, Listener>,
}

struct Listener {
    segments: Vec<String>,
    last_sent: Option<Value>,
    tx: mpsc::UnboundedSender<Option<Value>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root(Value::Null)
    }

    pub fn with_root(root: Value) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreState {
                root,
                next_subscription: 1,
                listeners: HashMap::new(),
            }),
        }
    }

    /// Replaces the value at `path`; `Value::Null` removes it.
    pub async fn set(&self, path: &str, value: Value) {
        let mut guard = self.inner.lock().await;
        set_at(&mut guard.root, &split_path(path), value);
        guard.notify_listeners();
    }

    pub async fn remove(&self, path: &str) {
        self.set(path, Value::Null).await;
    }

    pub async fn listener_count(&self) -> usize {
        let mut guard = self.inner.lock().await;
        guard.listeners.retain(|_, listener| !listener.tx.is_closed());
        guard.listeners.len()
    }
}

impl MemoryStoreState {
    fn value_at(&self, segments: &[String]) -> Option<Value> {
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        get_at(&self.root, &segments).cloned()
    }

    fn notify_listeners(&mut self) {
        let mut closed = Vec::new();
        let snapshots: Vec<(SubscriptionId, Option<Value>)> = self
            .listeners
            .iter()
            .map(|(id, listener)| (*id, self.value_at(&listener.segments)))
            .collect();

        for (id, current) in snapshots {
            let Some(listener) = self.listeners.get_mut(&id) else {
                continue;
            };
            if listener.last_sent == current {
                continue;
            }
            if listener.tx.send(current.clone()).is_err() {
                closed.push(id);
                continue;
            }
            listener.last_sent = current;
        }

        for id in closed {
            debug!("store: dropping closed listener id={id}");
            self.listeners.remove(&id);
        }
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let mut guard = self.inner.lock().await;
        let id = SubscriptionId(guard.next_subscription);
        guard.next_subscription += 1;

        let segments: Vec<String> = split_path(path).into_iter().map(str::to_string).collect();
        let current = guard.value_at(&segments);
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(current.clone());
        guard.listeners.insert(
            id,
            Listener {
                segments,
                last_sent: current,
                tx,
            },
        );

        debug!("store: subscribed id={id} path={path}");
        Ok(Subscription::new(id, path, rx))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.listeners.remove(&id).is_some() {
            debug!("store: unsubscribed id={id}");
        }
        Ok(())
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let guard = self.inner.lock().await;
        Ok(get_at(&guard.root, &split_path(path)).cloned())
    }

    async fn update(&self, path: &str, patch: Map<String, Value>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        merge_at(&mut guard.root, &split_path(path), patch);
        guard.notify_listeners();
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
