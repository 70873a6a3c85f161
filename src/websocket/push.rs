use crate::error::AppError;
use crate::models::User;
use crate::utils::jwt::decode_jwt;
use crate::websocket::hub::PushHub;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token comes
/// in the query string.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_jwt(&query.token).map_err(|_| AppError::Unauthorized)?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(user_id)
        .one(&db)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !user.is_active() {
        return Err(AppError::Forbidden("Account is not active".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, hub)))
}

async fn handle_socket(socket: WebSocket, user_id: i32, hub: PushHub) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn_id, mut rx) = hub.subscribe(user_id);

    tracing::info!(user_id, conn_id, "websocket connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unsubscribe(user_id, conn_id);
    tracing::info!(user_id, conn_id, "websocket disconnected");
}
