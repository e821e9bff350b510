//! WebSocket handler for real-time event streaming
//!
//! `/api/ws` forwards bus events to clients that subscribed to a matching
//! topic (`*`, `motion.*`, `recording.started`, ...). After the first
//! subscription the client receives the current status of every camera so
//! it does not have to wait for the next check cycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{SystemEvent, TopicFilter};
use crate::state::AppState;

/// Client-to-server message
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum ClientMessage {
    /// Subscribe to event topics
    #[serde(rename = "subscribe")]
    Subscribe { topics: Vec<String> },

    /// Unsubscribe from event topics
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topics: Vec<String> },

    /// Ping (keep-alive)
    #[serde(rename = "ping")]
    Ping,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Current status of every camera as status events
fn status_snapshot(state: &AppState) -> Vec<SystemEvent> {
    state
        .cameras
        .statuses_for(&state.registry.names())
        .into_iter()
        .map(|(camera, status)| SystemEvent::CameraStatusChanged {
            camera,
            status: status.status,
            error: status.error,
        })
        .collect()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.events.subscribe();
    let mut shutdown_rx = state.shutdown_signal();

    // Nothing is forwarded until the client subscribes
    let mut filter = TopicFilter::default();
    let mut snapshot_sent = false;

    info!("WebSocket client connected");

    let mut heartbeat_interval = tokio::time::interval(tokio::time::Duration::from_secs(30));

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_client_message(&text, &mut filter) {
                            warn!("Failed to handle client message: {}", e);
                        }

                        if !snapshot_sent && !filter.is_empty() {
                            snapshot_sent = true;
                            let mut failed = false;
                            for event in status_snapshot(&state) {
                                if !filter.matches(&event) {
                                    continue;
                                }
                                if let Ok(json) = serialize_event(&event) {
                                    if sender.send(Message::Text(json)).await.is_err() {
                                        failed = true;
                                        break;
                                    }
                                }
                            }
                            if failed {
                                warn!("Failed to send status snapshot to client");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        debug!("Received ping from client");
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if filter.matches(&event) {
                            if let Ok(json) = serialize_event(&event) {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    warn!("Failed to send event to client, disconnecting");
                                    break;
                                }
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {} events", n);
                        let error_event = SystemEvent::Error {
                            message: format!("Lagged by {} events", n),
                        };
                        if let Ok(json) = serialize_event(&error_event) {
                            let _ = sender.send(Message::Text(json)).await;
                        }
                    }
                    Err(_) => {
                        warn!("Event bus closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!("Failed to send ping, disconnecting");
                    break;
                }
            }

            _ = shutdown_rx.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    debug!("WebSocket handler exiting");
}

fn handle_client_message(text: &str, filter: &mut TopicFilter) -> Result<(), serde_json::Error> {
    let msg: ClientMessage = serde_json::from_str(text)?;

    match msg {
        ClientMessage::Subscribe { topics } => {
            info!("Client subscribed to topics: {:?}", topics);
            filter.subscribe(topics);
        }
        ClientMessage::Unsubscribe { topics } => {
            filter.unsubscribe(&topics);
            info!("Client unsubscribed from topics: {:?}", topics);
        }
        ClientMessage::Ping => {
            debug!("Received ping from client");
        }
    }

    Ok(())
}

fn serialize_event(event: &SystemEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
