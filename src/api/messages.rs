use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::services::message::{mark_read, send_message};
use crate::utils::error::AppResult;
use crate::utils::helpers::{extract_user_id, json_response};
use crate::websocket::events::ServerEvent;

#[derive(Deserialize)]
struct SendMessageRequest {
    receiver_id: String,
    content: String,
}

#[derive(Deserialize)]
struct MarkReadRequest {
    message_ids: Vec<String>,
}

async fn send(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let sender_id = extract_user_id(&headers)?;

    let message = send_message(
        &state.db,
        &sender_id,
        &payload.receiver_id,
        payload.content,
    )
    .await?;

    // Message bodies go to the two participants only, never the shared
    // broadcast channel.
    state
        .ws_manager
        .notify_pair(
            &message.sender_id,
            &message.receiver_id,
            ServerEvent::MessageCreated {
                message_id: message.id.clone(),
                sender_id: message.sender_id.clone(),
                receiver_id: message.receiver_id.clone(),
                content: message.content.clone(),
                created_at: message.created_at.clone(),
            },
        )
        .await;

    Ok(json_response(&message))
}

async fn read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<MarkReadRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let reader_id = extract_user_id(&headers)?;
    let marked = mark_read(&state.db, &payload.message_ids, &reader_id).await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(send))
        .route("/read", post(read))
        .with_state(state)
}
