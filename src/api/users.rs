use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{delete, get},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::services::user::{deactivate_user, get_profile};
use crate::utils::error::AppResult;
use crate::utils::helpers::{extract_user_id, json_response};
use crate::websocket::events::ServerEvent;

async fn my_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = extract_user_id(&headers)?;
    let profile = get_profile(&state.db, &user_id).await?;
    Ok(json_response(&profile))
}

async fn deactivate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = extract_user_id(&headers)?;
    deactivate_user(&state.db, &user_id).await?;

    state
        .ws_manager
        .broadcast(ServerEvent::PresenceChanged {
            user_id,
            is_online: false,
        })
        .await;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/me", get(my_profile))
        .route("/me", delete(deactivate))
        .with_state(state)
}
