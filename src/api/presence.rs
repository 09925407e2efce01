use axum::{Json, Router, extract::State, http::HeaderMap, http::StatusCode, routing::post};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::services::presence;
use crate::utils::error::AppResult;
use crate::utils::helpers::extract_user_id;
use crate::websocket::events::ServerEvent;

#[derive(Deserialize)]
struct PresenceUpdate {
    is_online: bool,
}

/// Heartbeats and visibility transitions both land here; the body carries
/// only the reported flag.
async fn update_presence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PresenceUpdate>,
) -> AppResult<StatusCode> {
    let user_id = extract_user_id(&headers)?;

    let flipped = presence::set_online(&state.db, &user_id, payload.is_online).await?;

    if flipped {
        state
            .ws_manager
            .broadcast(ServerEvent::PresenceChanged {
                user_id,
                is_online: payload.is_online,
            })
            .await;
    }

    Ok(StatusCode::OK)
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(update_presence))
        .with_state(state)
}
