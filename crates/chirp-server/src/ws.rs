//! WebSocket bridge between subscribers and the stream fan-out.
//!
//! Each accepted socket registers one listener whose callback pushes
//! wire frames onto an unbounded channel; a single task pumps the
//! channel into the socket and watches for the peer going away. The
//! listener is unregistered on any exit path.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::server::AppState;

/// GET `/stream` — upgrade to a WebSocket subscriber.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = state.relay.register_listener(move |msg| {
        let _ = tx.send(msg);
    });
    info!(listener = %id, "new connection");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(other)) => {
                    // Subscribers only listen; anything inbound beyond
                    // control frames is ignored.
                    debug!(listener = %id, ?other, "ignoring inbound frame");
                }
            },
        }
    }

    info!(listener = %id, "closed connection");
    state.relay.unregister_listener(&id);
}
