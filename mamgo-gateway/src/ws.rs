//! The real-time messaging gateway.
//!
//! Wire contract: clients send `join_order` / `send_message` JSON text
//! frames; the gateway answers with `joined`, broadcasts
//! `message_received` to the order's room, and reports failures as
//! `error` events on the same connection instead of closing it.

use axum::extract::ws::{Message as WsFrame, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use mamgo_core::error::CoreError;
use mamgo_core::models::{Actor, Message, MessageType};
use mamgo_core::{messages, orders, DbPool};

use crate::auth;
use crate::handlers::AppState;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinOrder { order_id: Uuid },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        order_id: Uuid,
        receiver_id: Uuid,
        content: String,
        message_type: Option<MessageType>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Joined { order_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        id: Uuid,
        order_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        message_type: MessageType,
        is_read: bool,
        created_at: DateTime<Utc>,
    },
    Error { message: String },
}

impl ServerEvent {
    fn received(message: Message) -> Self {
        ServerEvent::MessageReceived {
            id: message.id,
            order_id: message.order_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: message.message_type,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws — upgrade to the per-order chat channel.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // A missing or invalid token downgrades the connection to guest
    // instead of rejecting the handshake.
    let actor = query.token.as_deref().and_then(|token| {
        auth::decode_actor(&state.decoding_key, token.trim_start_matches("Bearer "))
    });
    if actor.is_none() {
        tracing::debug!("socket connected without valid token (guest)");
    }
    ws.on_upgrade(move |socket| handle_connection(socket, state, actor))
}

async fn handle_connection(socket: WebSocket, state: AppState, actor: Option<Actor>) {
    let conn_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsFrame::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            WsFrame::Text(text) => text,
            WsFrame::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => handle_event(&state, actor.as_ref(), conn_id, &tx, event).await,
            Err(_) => {
                let _ = tx.send(ServerEvent::error("unrecognized event"));
            }
        }
    }

    state.rooms.leave_all(conn_id);
    forward.abort();
}

async fn handle_event(
    state: &AppState,
    actor: Option<&Actor>,
    conn_id: Uuid,
    tx: &UnboundedSender<ServerEvent>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinOrder { order_id } => {
            let order = match with_conn(&state.pool, move |conn| {
                orders::get_order(conn, order_id).map(|(order, _)| order)
            })
            .await
            {
                Ok(order) => order,
                Err(err) => {
                    let _ = tx.send(ServerEvent::error(join_error(&err)));
                    return;
                }
            };

            // Guests join unconditionally; authenticated callers must
            // be a party to the order.
            if let Some(actor) = actor {
                let is_party = actor.user_id == order.customer_id
                    || order.courier_id == Some(actor.user_id);
                if !is_party {
                    let _ = tx.send(ServerEvent::error("unauthorized to join this order room"));
                    return;
                }
            }

            state.rooms.join(order_id, conn_id, tx.clone());
            let _ = tx.send(ServerEvent::Joined { order_id });
        }

        ClientEvent::SendMessage {
            order_id,
            receiver_id,
            content,
            message_type,
        } => {
            let Some(actor) = actor else {
                let _ = tx.send(ServerEvent::error("unauthorized"));
                return;
            };

            let sender_id = actor.user_id;
            let message_type = message_type.unwrap_or(MessageType::Text);
            let persisted = with_conn(&state.pool, move |conn| {
                messages::create_message(
                    conn,
                    sender_id,
                    order_id,
                    receiver_id,
                    &content,
                    message_type,
                )
            })
            .await;

            match persisted {
                Ok(message) => {
                    let fanned_out = state
                        .rooms
                        .broadcast(order_id, &ServerEvent::received(message));
                    tracing::debug!(%order_id, fanned_out, "message broadcast");
                }
                Err(err) => {
                    let _ = tx.send(ServerEvent::error(send_error(&err)));
                }
            }
        }
    }
}

async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, CoreError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| CoreError::Transient(e.to_string()))?
}

fn join_error(err: &CoreError) -> String {
    match err {
        CoreError::NotFound(_) => "order not found".to_string(),
        other => other.to_string(),
    }
}

fn send_error(err: &CoreError) -> String {
    match err {
        CoreError::Authorization(_) => "invalid sender/receiver pair".to_string(),
        CoreError::NotFound(_) => "order not found".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_order_event_parses_from_the_wire_shape() {
        let order_id = Uuid::new_v4();
        let raw = format!(r#"{{"event":"join_order","orderId":"{order_id}"}}"#);
        assert_eq!(
            serde_json::from_str::<ClientEvent>(&raw).unwrap(),
            ClientEvent::JoinOrder { order_id }
        );
    }

    #[test]
    fn send_message_event_defaults_to_text() {
        let order_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"event":"send_message","orderId":"{order_id}","receiverId":"{receiver_id}","content":"toi dang den"}}"#
        );
        let event = serde_json::from_str::<ClientEvent>(&raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                order_id,
                receiver_id,
                content: "toi dang den".to_string(),
                message_type: None,
            }
        );
    }

    #[test]
    fn unknown_events_fail_to_parse() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn server_events_serialize_with_camel_case_fields() {
        let order_id = Uuid::new_v4();
        let json =
            serde_json::to_value(ServerEvent::Joined { order_id }).unwrap();
        assert_eq!(json["event"], "joined");
        assert_eq!(json["orderId"], order_id.to_string());

        let json = serde_json::to_value(ServerEvent::error("order not found")).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "order not found");
    }

    #[test]
    fn message_received_carries_the_persisted_fields() {
        let message = Message {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "sap toi noi".to_string(),
            message_type: MessageType::Text,
            is_read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(ServerEvent::received(message.clone())).unwrap();
        assert_eq!(json["event"], "message_received");
        assert_eq!(json["senderId"], message.sender_id.to_string());
        assert_eq!(json["content"], "sap toi noi");
        assert_eq!(json["messageType"], "text");
        assert_eq!(json["isRead"], false);
    }
}
