pub mod auth;
pub mod messages;
pub mod presence;
pub mod rooms;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub use auth::AppState;

pub fn routes(state: Arc<AppState>) -> Router {
    let ws_route = Router::new()
        .route(
            "/ws",
            axum::routing::get(crate::websocket::handlers::ws_handler),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .nest("/presence", presence::routes(state.clone()))
        .nest("/rooms", rooms::routes(state.clone()))
        .nest("/messages", messages::routes(state.clone()))
        .nest("/users", users::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(ws_route)
        .nest("/auth", auth::routes(state.clone()))
        .merge(protected_routes)
}
