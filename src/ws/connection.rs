//! WebSocket connection state machine.
//!
//! Handles the read/write loop for one client of one game. The
//! connection keeps a [`SequenceCursor`] of what it has delivered, so a
//! lagging receiver or a sequence gap is repaired by re-attaching from the
//! last delivered sequence instead of dropping events silently.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType, WsRequest};
use crate::domain::reconcile::CursorStep;
use crate::domain::{GameId, GameUpdate, ResyncPlan, SequenceCursor};
use crate::error::GatewayError;
use crate::service::GameService;

type WsSink = SplitSink<WebSocket, Message>;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Sends the catch-up frames for `last_known_sequence`.
/// - Forwards the game's events (in sequence, without duplicates) and
///   clock frames.
/// - Answers `resync` and `ping` commands from the client.
pub async fn run_connection(
    socket: WebSocket,
    service: Arc<GameService>,
    game_id: GameId,
    last_known_sequence: u64,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut cursor = SequenceCursor::default();

    let Some(mut update_rx) =
        attach(&service, game_id, last_known_sequence, &mut cursor, &mut ws_tx).await
    else {
        return;
    };

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let request = match serde_json::from_str::<WsRequest>(&text) {
                            Ok(request) => request,
                            Err(err) => {
                                let reply = WsMessage::error(
                                    String::new(),
                                    &GatewayError::InvalidRequest(format!("malformed command: {err}")),
                                );
                                if !send(&mut ws_tx, &reply).await {
                                    break;
                                }
                                continue;
                            }
                        };
                        match request.command {
                            WsCommand::Resync { last_known_sequence } => {
                                match attach(&service, game_id, last_known_sequence, &mut cursor, &mut ws_tx).await {
                                    Some(rx) => update_rx = rx,
                                    None => break,
                                }
                                let reply = WsMessage::reply(
                                    request.id,
                                    WsMessageType::Response,
                                    serde_json::json!({
                                        "command": "resync",
                                        "head_sequence": cursor.last_applied(),
                                    }),
                                );
                                if !send(&mut ws_tx, &reply).await {
                                    break;
                                }
                            }
                            WsCommand::Ping => {
                                let reply = WsMessage::reply(
                                    request.id,
                                    WsMessageType::Response,
                                    serde_json::json!({
                                        "command": "pong",
                                        "head_sequence": cursor.last_applied(),
                                    }),
                                );
                                if !send(&mut ws_tx, &reply).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            // Update from the game's broadcast channel
            update = update_rx.recv() => {
                match update {
                    Ok(GameUpdate::Event(event)) => match cursor.observe(event.sequence_number) {
                        CursorStep::Apply => {
                            if !send(&mut ws_tx, &WsMessage::event(&event)).await {
                                break;
                            }
                        }
                        CursorStep::Duplicate => {}
                        CursorStep::Gap { expected, received } => {
                            tracing::warn!(%game_id, expected, received, "ws stream gap, resyncing");
                            let from = cursor.last_applied();
                            match attach(&service, game_id, from, &mut cursor, &mut ws_tx).await {
                                Some(rx) => update_rx = rx,
                                None => break,
                            }
                        }
                    },
                    Ok(GameUpdate::Clock(clock)) => {
                        if !send(&mut ws_tx, &WsMessage::clock(&clock)).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%game_id, lagged = n, "ws client lagged behind game stream, resyncing");
                        let from = cursor.last_applied();
                        match attach(&service, game_id, from, &mut cursor, &mut ws_tx).await {
                            Some(rx) => update_rx = rx,
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(%game_id, "ws connection closed");
}

/// Subscribes to the game, sends whatever brings the client from
/// `last_known_sequence` to head, and moves `cursor` to head.
///
/// Returns `None` when the connection should close.
async fn attach(
    service: &GameService,
    game_id: GameId,
    last_known_sequence: u64,
    cursor: &mut SequenceCursor,
    ws_tx: &mut WsSink,
) -> Option<broadcast::Receiver<GameUpdate>> {
    let attachment = match service.attach(game_id, last_known_sequence).await {
        Ok(attachment) => attachment,
        Err(err) => {
            send(ws_tx, &WsMessage::error(String::new(), &err)).await;
            return None;
        }
    };

    let catch_up = match attachment.plan {
        ResyncPlan::Live => None,
        ResyncPlan::Replay => Some(WsMessage::backfill(
            &attachment.backfill,
            attachment.head_sequence,
        )),
        ResyncPlan::Snapshot => attachment.snapshot.as_ref().map(WsMessage::snapshot),
    };
    if let Some(msg) = catch_up
        && !send(ws_tx, &msg).await
    {
        return None;
    }
    cursor.reset_to(attachment.head_sequence);

    if !send(ws_tx, &WsMessage::clock(&attachment.clock)).await {
        return None;
    }
    Some(attachment.receiver)
}

/// Sends one envelope. Returns `false` once the socket is gone or the
/// envelope cannot be encoded; the caller closes the connection so the
/// client reconnects from its last applied sequence.
async fn send(ws_tx: &mut WsSink, msg: &WsMessage) -> bool {
    let Some(json) = msg.to_text() else {
        tracing::warn!(id = %msg.id, msg_type = ?msg.msg_type, "ws frame encoding failed, closing");
        return false;
    };
    ws_tx.send(Message::text(json)).await.is_ok()
}
