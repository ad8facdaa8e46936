// Integration tests for the location query API
//
// The hub runs against in-memory fakes: the fetcher returns fixed rows and
// the connector hands out a feed that never produces anything.

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use fleetcast::api::{create_query_router, QueryAppState};
use fleetcast::fetch::BulkFetcher;
use fleetcast::supervisor::{UpstreamConnector, UpstreamSignal};
use fleetcast::{HubConfig, Location, LocationHub};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FixedFetcher {
    rows: Vec<Location>,
    calls: AtomicUsize,
}

#[async_trait]
impl BulkFetcher for FixedFetcher {
    async fn fetch_all(&self) -> Result<Vec<Location>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

struct SilentConnector;

#[async_trait]
impl UpstreamConnector for SilentConnector {
    fn name(&self) -> &str {
        "silent"
    }

    async fn connect(&self) -> Result<BoxStream<'static, UpstreamSignal>> {
        Ok(stream::pending().boxed())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn location(id: &str, lat: f64, lng: f64) -> Location {
    Location {
        entity_id: id.to_string(),
        display_name: Some(format!("Driver {}", id)),
        latitude: lat,
        longitude: lng,
        observed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        active_task_id: None,
    }
}

fn create_test_app() -> (Router, LocationHub, Arc<FixedFetcher>) {
    let fetcher = Arc::new(FixedFetcher {
        rows: vec![
            location("d-2", 33.45, -112.07),
            location("d-1", 33.44, -112.08),
        ],
        calls: AtomicUsize::new(0),
    });
    let hub = LocationHub::new(
        HubConfig::default(),
        fetcher.clone(),
        Arc::new(SilentConnector),
    );
    let app = create_query_router(Arc::new(QueryAppState { hub: hub.clone() }));
    (app, hub, fetcher)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_refresh(app: Router) -> StatusCode {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/locations/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
    .status()
}

async fn wait_for_locations(hub: &LocationHub, count: usize) {
    for _ in 0..100 {
        if hub.snapshot().len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {} locations", count);
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// GET /api/locations before any fetch → empty array
#[tokio::test]
async fn test_locations_empty_initially() {
    let (app, _hub, _fetcher) = create_test_app();

    let (status, body) = get_json(app, "/api/locations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

/// POST /api/locations/refresh → 202, then the cache is populated
#[tokio::test]
async fn test_refresh_populates_cache() {
    let (app, hub, fetcher) = create_test_app();

    assert_eq!(post_refresh(app.clone()).await, StatusCode::ACCEPTED);
    wait_for_locations(&hub, 2).await;
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let (status, body) = get_json(app, "/api/locations").await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Sorted by driver id
    assert_eq!(rows[0]["entity_id"], "d-1");
    assert_eq!(rows[0]["display_name"], "Driver d-1");
    assert_eq!(rows[0]["latitude"], 33.44);
    assert_eq!(rows[1]["entity_id"], "d-2");
}

/// GET /api/status with no observers → Disconnected / Closed
#[tokio::test]
async fn test_status_without_observers() {
    let (app, _hub, _fetcher) = create_test_app();

    let (status, body) = get_json(app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Disconnected");
    assert_eq!(body["connection"], "Closed");
    assert_eq!(body["observers"], 0);
}

/// GET /api/status while a subscription is open reports the observer
#[tokio::test]
async fn test_status_counts_observers() {
    let (app, hub, _fetcher) = create_test_app();

    let _sub = hub.subscribe();
    hub.wait_for_state(|s| s.observers == 1).await;

    let (status, body) = get_json(app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    // The silent feed never completes its handshake
    assert_eq!(body["connection"], "Connecting");
    assert_eq!(body["status"], "Disconnected");
    assert_eq!(body["observers"], 1);
}

/// Unknown route → 404
#[tokio::test]
async fn test_unknown_route() {
    let (app, _hub, _fetcher) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/drivers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
