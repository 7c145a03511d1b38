use super::*;
use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::error::ErrorCode;
use tokio::net::TcpListener;

const RIDE_STREAM: &str = "event: put\n\
data: {\"path\":\"/\",\"data\":{\"status\":\"pending\"}}\n\
\n\
event: keep-alive\n\
data: null\n\
\n\
event: put\n\
data: {\"path\":\"/offers/d1\",\"data\":{\"driverName\":\"A\",\"price\":100}}\n\
\n\
event: patch\n\
data: {\"path\":\"/\",\"data\":{\"status\":\"confirmed\"}}\n\
\n\
event: cancel\n\
data: null\n\
\n";

#[derive(Clone, Default)]
struct MockState {
    patches: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn read_ride(Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
    if query.get("auth").map(String::as_str) != Some("secret") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Permission denied" })),
        );
    }
    (StatusCode::OK, Json(json!({ "status": "pending" })))
}

async fn patch_ride(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state
        .patches
        .lock()
        .await
        .push((query.get("auth").cloned(), body.clone()));
    Json(body)
}

async fn read_missing() -> Json<Value> {
    Json(Value::Null)
}

async fn stream_ride() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/event-stream")], RIDE_STREAM)
}

async fn spawn_store_server() -> (String, MockState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = MockState::default();
    let app = Router::new()
        .route("/requests/r1.json", get(read_ride).patch(patch_ride))
        .route("/requests/missing.json", get(read_missing))
        .route("/requests/live.json", get(stream_ride))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

#[test]
fn rejects_non_http_base_urls() {
    assert!(matches!(
        FirebaseRestStore::new("ftp://example.com", None),
        Err(StoreUrlError::UnsupportedScheme(_))
    ));
    assert!(matches!(
        FirebaseRestStore::new("not a url", None),
        Err(StoreUrlError::Invalid { .. })
    ));
}

#[test]
fn endpoint_appends_json_suffix_and_auth() {
    let store =
        FirebaseRestStore::new("https://rides.example.com/db", Some("tok".into())).expect("store");
    let url = store.endpoint("/requests/r1/").expect("url");
    assert_eq!(
        url.as_str(),
        "https://rides.example.com/db/requests/r1.json?auth=tok"
    );
}

#[test]
fn stream_events_update_snapshot() {
    let mut snapshot = Value::Null;
    let put = ServerSentEvent {
        event: "put".into(),
        data: r#"{"path":"/","data":{"status":"pending"}}"#.into(),
    };
    assert_eq!(apply_stream_event(&mut snapshot, &put), StreamStep::Changed);
    assert_eq!(apply_stream_event(&mut snapshot, &put), StreamStep::Unchanged);

    let delete = ServerSentEvent {
        event: "put".into(),
        data: r#"{"path":"/","data":null}"#.into(),
    };
    assert_eq!(apply_stream_event(&mut snapshot, &delete), StreamStep::Changed);
    assert_eq!(snapshot, Value::Null);

    let revoked = ServerSentEvent {
        event: "auth_revoked".into(),
        data: "null".into(),
    };
    assert_eq!(
        apply_stream_event(&mut snapshot, &revoked),
        StreamStep::Closed("auth_revoked".into())
    );
}

#[tokio::test]
async fn read_once_returns_record_and_absent() {
    let (url, _state) = spawn_store_server().await;
    let store = FirebaseRestStore::new(&url, Some("secret".into())).expect("store");

    let value = store.read_once("requests/r1").await.expect("read");
    assert_eq!(value, Some(json!({ "status": "pending" })));

    let missing = store.read_once("requests/missing").await.expect("read");
    assert_eq!(missing, None);
}

#[tokio::test]
async fn failed_requests_surface_store_error_body() {
    let (url, _state) = spawn_store_server().await;
    let store = FirebaseRestStore::new(&url, None).expect("store");

    let err = store.read_once("requests/r1").await.expect_err("must fail");
    let exception = err
        .downcast_ref::<StoreException>()
        .expect("store exception");
    assert_eq!(exception.code, ErrorCode::Unauthorized);
    assert_eq!(exception.message, "Permission denied");
}

#[tokio::test]
async fn update_sends_patch_with_auth() {
    let (url, state) = spawn_store_server().await;
    let store = FirebaseRestStore::new(&url, Some("secret".into())).expect("store");

    let Value::Object(patch) = json!({ "status": "confirmed", "driverName": "A" }) else {
        unreachable!()
    };
    store.update("requests/r1", patch).await.expect("update");

    let patches = state.patches.lock().await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].0.as_deref(), Some("secret"));
    assert_eq!(
        patches[0].1,
        json!({ "status": "confirmed", "driverName": "A" })
    );
}

#[tokio::test]
async fn subscription_follows_put_and_patch_events_until_cancel() {
    let (url, _state) = spawn_store_server().await;
    let store = FirebaseRestStore::new(&url, None).expect("store");

    let mut subscription = store.subscribe("requests/live").await.expect("subscribe");
    let mut seen = Vec::new();
    let collect = async {
        while let Some(update) = subscription.next().await {
            seen.push(update);
        }
    };
    tokio::time::timeout(Duration::from_secs(2), collect)
        .await
        .expect("stream should end on cancel");

    assert_eq!(
        seen,
        vec![
            Some(json!({ "status": "pending" })),
            Some(json!({
                "status": "pending",
                "offers": { "d1": { "driverName": "A", "price": 100 } }
            })),
            Some(json!({
                "status": "confirmed",
                "offers": { "d1": { "driverName": "A", "price": 100 } }
            })),
        ]
    );
}
