use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use shared::error::StoreException;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    sse::{EventStreamDecoder, ServerSentEvent},
    tree::{merge_at, set_at, split_path},
    RealtimeStore, Subscription, SubscriptionId,
};

#[derive(Debug, Error)]
pub enum StoreUrlError {
    #[error("invalid store url '{url}': {source}")]
    Invalid {
        url: String,
        source: url::ParseError,
    },
    #[error("store url must use http or https, got '{0}'")]
    UnsupportedScheme(String),
}

/// Realtime database reached over its REST interface: `GET`/`PATCH` on
/// `{base}/{path}.json`, and `text/event-stream` responses for listeners.
pub struct FirebaseRestStore {
    http: Client,
    base_url: Url,
    auth_token: Option<String>,
    next_subscription: AtomicU64,
    streams: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

#[derive(Debug, PartialEq)]
enum StreamStep {
    Changed,
    Unchanged,
    Closed(String),
}

impl FirebaseRestStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, StoreUrlError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|source| StoreUrlError::Invalid {
            url: base_url.to_string(),
            source,
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(StoreUrlError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        Ok(Self {
            http: Client::new(),
            base_url,
            auth_token,
            next_subscription: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let relative = format!("{}.json", split_path(path).join("/"));
        let mut url = self
            .base_url
            .join(&relative)
            .with_context(|| format!("failed to build store url for path '{path}'"))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreException::from_body(status.as_u16(), &body).into())
}

fn apply_stream_event(snapshot: &mut Value, event: &ServerSentEvent) -> StreamStep {
    match event.event.as_str() {
        "put" | "patch" => {
            let payload = match serde_json::from_str::<StreamPayload>(&event.data) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("store: malformed {} event ignored: {err}", event.event);
                    return StreamStep::Unchanged;
                }
            };
            let before = snapshot.clone();
            let segments = split_path(&payload.path);
            if event.event == "put" {
                set_at(snapshot, &segments, payload.data);
            } else if let Value::Object(patch) = payload.data {
                merge_at(snapshot, &segments, patch);
            } else {
                warn!("store: patch event without object data ignored");
                return StreamStep::Unchanged;
            }
            if *snapshot == before {
                StreamStep::Unchanged
            } else {
                StreamStep::Changed
            }
        }
        "cancel" | "auth_revoked" => StreamStep::Closed(event.event.clone()),
        _ => StreamStep::Unchanged,
    }
}

fn current_value(snapshot: &Value) -> Option<Value> {
    if snapshot.is_null() {
        None
    } else {
        Some(snapshot.clone())
    }
}

async fn pump_event_stream(
    id: SubscriptionId,
    response: Response,
    updates: mpsc::UnboundedSender<Option<Value>>,
) {
    let mut body = response.bytes_stream();
    let mut decoder = EventStreamDecoder::default();
    let mut snapshot = Value::Null;
    let mut delivered_initial = false;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("store: event stream failed id={id}: {err}");
                return;
            }
        };

        for event in decoder.push(&chunk) {
            match apply_stream_event(&mut snapshot, &event) {
                StreamStep::Changed => {}
                StreamStep::Unchanged if !delivered_initial && event.event == "put" => {}
                StreamStep::Unchanged => continue,
                StreamStep::Closed(reason) => {
                    info!("store: event stream closed by server id={id} reason={reason}");
                    return;
                }
            }
            delivered_initial = true;
            if updates.send(current_value(&snapshot)).is_err() {
                debug!("store: listener dropped id={id}");
                return;
            }
        }
    }
    debug!("store: event stream ended id={id}");
}

#[async_trait]
impl RealtimeStore for FirebaseRestStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("failed to open event stream for '{path}'"))?;
        let response = ensure_success(response).await?;

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump_event_stream(id, response, tx));
        self.streams.lock().await.insert(id, task);

        info!("store: listening id={id} path={path}");
        Ok(Subscription::new(id, path, rx))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        if let Some(task) = self.streams.lock().await.remove(&id) {
            task.abort();
            debug!("store: stopped listening id={id}");
        }
        Ok(())
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .send()
            .await
            .with_context(|| format!("failed to read '{path}'"))?;
        let value: Value = ensure_success(response).await?.json().await?;
        Ok(current_value(&value))
    }

    async fn update(&self, path: &str, patch: Map<String, Value>) -> Result<()> {
        let response = self
            .http
            .patch(self.endpoint(path)?)
            .json(&patch)
            .send()
            .await
            .with_context(|| format!("failed to update '{path}'"))?;
        ensure_success(response).await?;
        Ok(())
    }
}

impl Drop for FirebaseRestStore {
    fn drop(&mut self) {
        for (_, task) in self.streams.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/firebase_tests.rs"]
mod tests;
