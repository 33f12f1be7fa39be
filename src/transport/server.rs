//! WebSocket endpoint for the driving simulator.
//!
//! Accepts upgrades on any path (the simulator's socket.io client connects to
//! `/socket.io/?EIO=..&transport=websocket`). Every text frame is handed to the
//! shared session under its lock and the reply, if any, is sent back before the
//! next frame is read. The lock is released before any `.await`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::driver::session::Session;

/// Controllers and tuner guarded as one unit.
pub type SharedSession = Arc<Mutex<Session>>;

/// Largest frame accepted from the simulator. Telemetry frames carry a camera image.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub fn router(session: SharedSession) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/*path", get(websocket_handler))
        .with_state(session)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: &str, session: SharedSession) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[Server] Listening on ws://{}", addr);

    axum::serve(listener, router(session))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[Server] Stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[Server] Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(session): State<SharedSession>) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| drive_socket(socket, session))
}

async fn drive_socket(mut socket: WebSocket, session: SharedSession) {
    info!("[Server] Connected");

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = session.lock().handle_frame(&text);
                if let Some(reply) = reply {
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary, pong
            Err(e) => {
                warn!("[Server] Receive error: {}", e);
                break;
            }
        }
    }

    info!("[Server] Disconnected");
}
