use futures::{SinkExt, StreamExt};
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::auth;
use crate::db;
use crate::error::AppError;
use crate::heartbeat::Heartbeat;
use crate::models::{Delivery, Identity, OutgoingChat};
use crate::state::AppState;

/// Identity carried by the `token` cookie; anything unusable means anonymous.
pub fn resolve_identity(cookie_header: Option<&str>, secret: &str) -> Option<Identity> {
    let token = cookie_header.and_then(auth::token_from_cookies)?;
    match auth::verify_token(token, secret) {
        Ok(claims) => Some(claims.into()),
        Err(e) => {
            warn!("Rejected socket token: {e}");
            None
        }
    }
}

pub async fn handle_websocket(ws: WebSocket, state: AppState, cookie_header: Option<String>) {
    let conn_id = Uuid::new_v4().to_string();
    let identity = resolve_identity(cookie_header.as_deref(), &state.config.jwt_secret);

    let (user_tx, user_rx) = tokio::sync::mpsc::unbounded_channel();
    let (mut ws_tx, mut ws_rx) = ws.split();

    state.hub.register(&conn_id, identity.clone(), user_tx).await;
    match &identity {
        Some(who) => info!("Connection {conn_id} opened by {} ({})", who.username, who.user_id),
        None => info!("Connection {conn_id} opened anonymously"),
    }
    state.hub.broadcast_online().await;

    let mut outbound = UnboundedReceiverStream::new(user_rx);
    let mut heartbeat = Heartbeat::new(
        state.config.heartbeat_interval,
        state.config.heartbeat_timeout,
    );
    let mut ticker = heartbeat.ticker();

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        let error = AppError::WebSocketError(format!("Error receiving message: {e}"));
                        warn!("{conn_id}: {}", error.log_details());
                        break;
                    }
                    None => break,
                };

                if msg.is_pong() {
                    heartbeat.pong_received();
                } else if msg.is_close() {
                    debug!("{conn_id} sent close");
                    break;
                } else if msg.is_ping() {
                    // answered by the protocol layer
                } else if let Ok(text) = msg.to_str() {
                    if let Err(e) = process_message(text, &state, identity.as_ref()).await {
                        warn!("{conn_id}: {}", e.log_details());
                        state.hub.send_to_connection(&conn_id, &e.to_frame()).await;
                    }
                } else {
                    warn!("Received non-text message from {conn_id}");
                    let error = AppError::ParseError("Only text messages are supported".to_string());
                    state.hub.send_to_connection(&conn_id, &error.to_frame()).await;
                }
            }
            outgoing = outbound.next() => {
                let Some(msg) = outgoing else { break };
                if let Err(e) = ws_tx.send(msg).await {
                    warn!("Error sending message to {conn_id}: {e}");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = ws_tx.send(Message::ping(Vec::new())).await {
                    warn!("Error pinging {conn_id}: {e}");
                    break;
                }
                heartbeat.ping_sent(Instant::now());
            }
            _ = heartbeat.expired() => {
                heartbeat.check(Instant::now());
                info!("Connection {conn_id} missed its pong, terminating");
                break;
            }
        }
    }

    if let Err(e) = ws_tx.close().await {
        debug!("Close of {conn_id} failed: {e}");
    }
    state.hub.unregister(&conn_id).await;
    info!("Connection {conn_id} closed, {} remaining", state.hub.len().await);
    state.hub.broadcast_online().await;
}

/// Handles one chat frame: stores the attachment and message, then fans it out.
pub async fn process_message(
    text: &str,
    state: &AppState,
    sender: Option<&Identity>,
) -> Result<Option<Delivery>, AppError> {
    let chat: OutgoingChat = serde_json::from_str(text)
        .map_err(|e| AppError::ParseError(format!("Invalid message format: {e}")))?;

    let sender = sender.ok_or_else(|| {
        AppError::Unauthorized("Sign in before sending messages".to_string())
    })?;

    let file = match &chat.file {
        Some(file) => Some(state.uploads.save(file).await?),
        None => None,
    };
    let body = chat.text.filter(|t| !t.is_empty());

    let Some(recipient) = chat.recipient.filter(|r| !r.is_empty()) else {
        debug!("Dropping frame from {} without recipient", sender.user_id);
        return Ok(None);
    };
    if body.is_none() && file.is_none() {
        debug!("Dropping empty frame from {} to {recipient}", sender.user_id);
        return Ok(None);
    }

    let stored = db::create_message(
        &state.db,
        &sender.user_id,
        &recipient,
        body.as_deref(),
        file.as_deref(),
    )
    .await?;

    let delivery = Delivery::from(&stored);
    let payload = serde_json::to_string(&delivery)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize message: {e}")))?;

    let sockets = state.hub.send_to_user(&recipient, &payload).await;
    debug!(
        "Message {} from {} to {recipient} reached {sockets} socket(s)",
        stored.id, sender.user_id
    );

    Ok(Some(delivery))
}
