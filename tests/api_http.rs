// tests/api_http.rs
use std::sync::Arc;

use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use scrapestream::api::{create_router, AppState};
use scrapestream::broadcast::SubscriberSet;

fn app() -> axum::Router {
    create_router(AppState {
        subscribers: Arc::new(SubscriberSet::new()),
    })
}

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/nothing-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plain_get_on_ws_route_is_rejected_without_upgrade() {
    // Without an Upgrade handshake the websocket route refuses the request
    // rather than hanging it.
    let resp = app()
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}
