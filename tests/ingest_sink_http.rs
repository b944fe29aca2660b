// tests/ingest_sink_http.rs
//
// HttpIngestSink against a local axum stand-in for the ingestion API.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use free_events_scraper::scrape::sink::{HttpIngestSink, INGEST_PATH};
use free_events_scraper::Sink;
use serde_json::Value;

#[derive(Clone)]
struct FakeIngest {
    reply: StatusCode,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn ingest(State(state): State<FakeIngest>, Json(body): Json<Value>) -> (StatusCode, String) {
    state.bodies.lock().unwrap().push(body);
    let msg = if state.reply.is_success() {
        r#"{"accepted":true}"#.to_string()
    } else {
        "database unavailable".to_string()
    };
    (state.reply, msg)
}

async fn spawn_ingest(reply: StatusCode) -> (String, FakeIngest) {
    let state = FakeIngest {
        reply,
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route(INGEST_PATH, post(ingest))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), state)
}

#[tokio::test]
async fn posts_one_batch_with_all_records() {
    let (base, fake) = spawn_ingest(StatusCode::CREATED).await;
    let sink = HttpIngestSink::new(&base, "test-agent/1.0", Duration::from_secs(5)).unwrap();
    assert!(sink.endpoint().ends_with("/api/v1/events/ingest"));
    assert!(!sink.endpoint().contains("//api"));

    let batch = common::records("Reddit /r/freefood", 3);
    sink.deliver("Reddit", batch).await.unwrap();

    let bodies = fake.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    let events = bodies[0]["events"].as_array().expect("events array");
    assert_eq!(events.len(), 3);

    let first = &events[0];
    assert_eq!(first["title"], "Reddit /r/freefood event 0");
    assert_eq!(first["category"], "Free Food");
    assert_eq!(first["latitude"], 37.0);
    assert_eq!(first["longitude"], -122.0);
    assert_eq!(first["source"], "Reddit /r/freefood");
    assert!(first["start_time"].as_str().unwrap().starts_with("2025-11-15T18:00:00"));
    assert!(first.get("end_time").is_none());
}

#[tokio::test]
async fn plain_ok_is_also_accepted() {
    let (base, _fake) = spawn_ingest(StatusCode::OK).await;
    let sink = HttpIngestSink::new(&base, "test-agent/1.0", Duration::from_secs(5)).unwrap();
    sink.deliver("Eventbrite", common::records("Eventbrite", 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn rejection_surfaces_status_and_body() {
    let (base, fake) = spawn_ingest(StatusCode::INTERNAL_SERVER_ERROR).await;
    let sink = HttpIngestSink::new(&base, "test-agent/1.0", Duration::from_secs(5)).unwrap();

    let err = sink
        .deliver("Eventbrite", common::records("Eventbrite", 2))
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("500"), "{err}");
    assert!(err.contains("database unavailable"), "{err}");
    assert_eq!(fake.bodies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_batch_sends_nothing() {
    let (base, fake) = spawn_ingest(StatusCode::CREATED).await;
    let sink = HttpIngestSink::new(&base, "test-agent/1.0", Duration::from_secs(5)).unwrap();

    sink.deliver("Reddit", Vec::new()).await.unwrap();
    assert!(fake.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_api_is_an_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = HttpIngestSink::new(&format!("http://{addr}"), "test-agent/1.0", Duration::from_secs(2)).unwrap();
    assert!(sink.deliver("Reddit", common::records("Reddit", 1)).await.is_err());
}
