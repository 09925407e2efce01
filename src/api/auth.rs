use axum::{
    Json, Router,
    routing::{get, post},
    extract::State,
};
use std::sync::Arc;

use crate::database::DbPool;
use crate::models::user::RegisterRequest;
use crate::services::auth::{LoginRequest, login_user, register_user};
use crate::utils::error::AppResult;
use crate::utils::helpers::json_response;
use crate::utils::jwt::JwtService;
use crate::websocket::connection::ConnectionManager;

pub struct AppState {
    pub db: DbPool,
    pub jwt_service: Arc<JwtService>,
    pub ws_manager: Arc<ConnectionManager>,
}

async fn health_check() -> &'static str {
    "OK"
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let response = register_user(&state.db, payload, &state.jwt_service).await?;
    Ok(json_response(&response))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let response = login_user(&state.db, payload, &state.jwt_service).await?;
    Ok(json_response(&response))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}
