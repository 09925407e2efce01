use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::AppState;
use crate::database;
use crate::services::presence::DEFAULT_PRESENCE_WINDOW_SECS;
use crate::utils::jwt::JwtService;

async fn proxy_to_frontend(mut req: Request) -> Response {
    let proxy_url = std::env::var("SERVER_PROXY_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:3001".to_string());

    let proxy_uri = match proxy_url.parse::<hyper::Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!("Invalid proxy URL {}: {}", proxy_url, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid proxy configuration",
            )
                .into_response();
        }
    };

    let path = req.uri().path();
    let path_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);

    let new_uri = format!("{}{}", proxy_url, path_query);
    match new_uri.parse() {
        Ok(uri) => *req.uri_mut() = uri,
        Err(e) => {
            tracing::error!("Failed to parse URI {}: {}", new_uri, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid URI").into_response();
        }
    }

    if let Some(host) = proxy_uri.host() {
        let host_value = if let Some(port) = proxy_uri.port_u16() {
            format!("{}:{}", host, port)
        } else {
            host.to_string()
        };
        if let Ok(header_value) = host_value.parse() {
            req.headers_mut().insert(hyper::header::HOST, header_value);
        }
    }

    let client = Client::builder(TokioExecutor::new()).build_http();

    match client.request(req).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!("Proxy error: {}", e);
            (StatusCode::BAD_GATEWAY, "Frontend not available").into_response()
        }
    }
}

pub async fn register_routes() -> Router {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://pairchat.db?mode=rwc".to_string());

    let db = database::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Database connected and migrations applied");

    let jwt_service = Arc::new(JwtService::from_env().expect("Failed to initialize JWT service"));
    let ws_manager = Arc::new(crate::websocket::connection::ConnectionManager::new());

    let presence_window = std::env::var("PRESENCE_WINDOW_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PRESENCE_WINDOW_SECS);

    crate::tasks::presence_sweep::start_presence_sweep(db.clone(), presence_window);
    tracing::info!("Presence sweep started (window {}s)", presence_window);

    let state = Arc::new(AppState {
        db,
        jwt_service,
        ws_manager,
    });

    let api_routes = crate::api::routes(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .fallback(proxy_to_frontend)
}
