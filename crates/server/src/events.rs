//! Live ledger changes over WebSocket.
//!
//! Each connection subscribes to the engine's broadcast sink and forwards the
//! notifications of one group as JSON text frames.

use api_types::events::LedgerEvent;
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use engine::LedgerNotification;
use tokio::sync::broadcast;

use crate::{ServerError, balances::map_change, server::ServerState};

pub async fn stream(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ServerError> {
    // 404 before upgrading.
    state.engine.group(&group_id).await?;
    let rx = state.events.subscribe();

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, rx, group_id)))
}

async fn stream_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<LedgerNotification>,
    group_id: String,
) {
    tracing::debug!("events stream opened for group {group_id}");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(notification) => {
                        if notification.group_id != group_id {
                            continue;
                        }
                        if send_event(&mut socket, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Clients reload balances over HTTP when they see a gap.
                        tracing::warn!("events stream for group {group_id} skipped {skipped} change(s)");
                        let payload = serde_json::json!({ "lagged": skipped }).to_string();
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("events stream closed for group {group_id}");
}

async fn send_event(
    socket: &mut WebSocket,
    notification: &LedgerNotification,
) -> Result<(), axum::Error> {
    let event = LedgerEvent {
        group_id: notification.group_id.clone(),
        affected_balances: notification
            .affected_balances
            .iter()
            .map(map_change)
            .collect(),
        new_group_total_minor: notification.new_group_total_minor,
    };
    let payload = serde_json::to_string(&event).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}
