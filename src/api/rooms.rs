use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::services::message::{list_between, mark_room_read};
use crate::services::room::{get_or_create_room, get_room, list_rooms_for};
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{extract_user_id, json_list, json_response};
use crate::websocket::events::ServerEvent;

#[derive(Deserialize)]
struct OpenRoomRequest {
    other_user_id: String,
}

#[derive(Deserialize)]
struct ThreadQuery {
    after: Option<String>,
    limit: Option<i64>,
}

async fn list_rooms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<serde_json::Value>>> {
    let viewer_id = extract_user_id(&headers)?;
    let rooms = list_rooms_for(&state.db, &viewer_id).await?;
    Ok(json_list(rooms))
}

async fn open_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<OpenRoomRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = extract_user_id(&headers)?;
    let room = get_or_create_room(&state.db, &user_id, &payload.other_user_id).await?;
    Ok(json_response(&room))
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<ThreadQuery>,
) -> AppResult<Json<Vec<serde_json::Value>>> {
    let viewer_id = extract_user_id(&headers)?;

    let room = get_room(&state.db, &room_id).await?;
    if !room.has_participant(&viewer_id) {
        return Err(AppError::Forbidden(
            "You are not part of this conversation".to_string(),
        ));
    }

    let messages = list_between(
        &state.db,
        &room.user1_id,
        &room.user2_id,
        query.after.as_deref(),
        query.limit,
    )
    .await?;

    Ok(json_list(messages))
}

async fn read_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let reader_id = extract_user_id(&headers)?;
    let room = get_room(&state.db, &room_id).await?;
    let marked = mark_room_read(&state.db, &room_id, &reader_id).await?;

    if marked > 0 {
        // Read receipts are between the two participants.
        let other_id = room.other_user_id(&reader_id);
        state
            .ws_manager
            .notify_pair(
                &reader_id,
                other_id,
                ServerEvent::MessagesRead { room_id, reader_id: reader_id.clone() },
            )
            .await;
    }

    Ok(Json(serde_json::json!({ "marked": marked })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(open_room))
        .route("/:room_id/messages", get(get_thread))
        .route("/:room_id/read", post(read_room))
        .with_state(state)
}
