// src/api.rs
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::broadcast::SubscriberSet;

#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<SubscriberSet>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// One task per subscriber: register with the broadcast set, forward every
/// frame until either side closes, then unregister. No backlog is replayed
/// on connect, and inbound frames are ignored (drained only to notice the
/// close).
async fn handle_socket(mut socket: WebSocket, state: AppState, addr: SocketAddr) {
    let client_id = format!("ws-{addr}");
    let mut rx = state.subscribers.add(&client_id);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(msg) = outbound else { break };
                if socket
                    .send(Message::Text(msg.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.subscribers.remove(&client_id);
}
