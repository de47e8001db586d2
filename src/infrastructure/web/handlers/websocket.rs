//! Live-channel endpoint.
//!
//! Each connected device gets one WebSocket. Inbound frames carry
//! [`ClientMessage`]s; outbound events are queued on an unbounded channel and
//! drained onto the socket by a writer task, so a slow socket never blocks
//! the coordinator.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

use crate::core::{AckOutcome, EventSender};
use crate::infrastructure::web::webserver::{with_state, AppState};
use crate::message::{ClientMessage, ServerMessage};

pub fn route(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("ws")
        .and(warp::ws())
        .and(with_state(state))
        .map(|ws: Ws, state: AppState| {
            ws.on_upgrade(move |socket| client_connected(socket, state))
        })
}

pub async fn client_connected(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to encode event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut registered_id: Option<String> = None;
    while let Some(result) = ws_rx.next().await {
        let frame = match result {
            Ok(f) => f,
            Err(e) => {
                debug!("Live channel read error: {}", e);
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else { continue };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Register { device_id, name }) => {
                let id = resolve_device_id(device_id);
                // Re-registering under a new id rebinds this socket; the
                // previous id must not stay online on a channel it no
                // longer owns.
                if let Some(old) = registered_id.take() {
                    if old != id {
                        state.registry.disconnect(&old).await;
                    }
                }
                register_device(&state, &id, name, tx.clone()).await;
                registered_id = Some(id);
            }
            Ok(ClientMessage::PasteAck {
                item_id,
                token,
                device_id,
            }) => {
                let result = acknowledge(&state, &item_id, &device_id, &token).await;
                let _ = tx.send(result);
            }
            Err(_) => {
                // Any other traffic just refreshes liveness.
                if let Some(id) = &registered_id {
                    state.registry.touch(id).await;
                }
            }
        }
    }

    if let Some(id) = registered_id {
        state.registry.disconnect(&id).await;
    }
    writer.abort();
}

fn resolve_device_id(device_id: Option<String>) -> String {
    device_id.filter(|d| !d.is_empty()).unwrap_or_else(|| {
        let suffix: String = Uuid::new_v4().simple().to_string();
        format!("anon-{}", &suffix[..7])
    })
}

/// Bind the channel, confirm registration, then replay every open cut so the
/// device resyncs without queued redelivery.
async fn register_device(state: &AppState, id: &str, name: Option<String>, tx: EventSender) {
    let name = name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    state.registry.register(id, &name, tx.clone()).await;
    let _ = tx.send(ServerMessage::Registered {
        device_id: id.to_string(),
    });

    for item in state.store.list().await {
        if let Some(cut) = item.cut {
            let _ = tx.send(ServerMessage::CutCreated {
                item_id: item.id,
                cut,
            });
        }
    }
}

async fn acknowledge(
    state: &AppState,
    item_id: &str,
    device_id: &str,
    token: &str,
) -> ServerMessage {
    match state.coordinator.acknowledge(item_id, device_id, token).await {
        Ok(AckOutcome::Pending(pending)) => ServerMessage::PasteAckResult {
            ok: true,
            pending: Some(pending),
            deleted: None,
        },
        Ok(AckOutcome::Deleted) => ServerMessage::PasteAckResult {
            ok: true,
            pending: None,
            deleted: Some(true),
        },
        Err(e) => {
            debug!("Rejected paste-ack for {}: {}", item_id, e);
            ServerMessage::PasteAckResult {
                ok: false,
                pending: None,
                deleted: None,
            }
        }
    }
}
