use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::models::chat_room::{ChatRoom, RoomSummary};
use crate::models::message::Message;
use crate::models::user::PublicProfile;
use crate::utils::error::ErrorResponse;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    Api { status: u16, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// No request may outlive this; a wedged server surfaces as an error
/// instead of a stuck client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    user: PublicProfile,
    token: String,
}

#[derive(Debug, Deserialize)]
struct MarkedBody {
    marked: u64,
}

/// Thin typed wrapper over the HTTP surface; every method is one request.
pub struct ChatApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatApi {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: http_client(),
            base_url,
            token,
        }
    }

    pub async fn login(
        base_url: String,
        username: &str,
        password: &str,
    ) -> ClientResult<(Self, PublicProfile)> {
        let http = http_client();
        let response = http
            .post(format!("{}/api/auth/login", base_url))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let body: LoginBody = check(response).await?.json().await?;

        Ok((
            Self {
                http,
                base_url,
                token: body.token,
            },
            body.user,
        ))
    }

    /// Presence report; callers treat failures as droppable.
    pub async fn set_presence(&self, is_online: bool) -> ClientResult<()> {
        let response = self
            .http
            .post(format!("{}/api/presence", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "is_online": is_online }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    pub async fn list_rooms(&self) -> ClientResult<Vec<RoomSummary>> {
        let response = self
            .http
            .get(format!("{}/api/rooms", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn open_room(&self, other_user_id: &str) -> ClientResult<ChatRoom> {
        let response = self
            .http
            .post(format!("{}/api/rooms", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "other_user_id": other_user_id }))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn fetch_thread(
        &self,
        room_id: &str,
        after: Option<&str>,
        limit: Option<i64>,
    ) -> ClientResult<Vec<Message>> {
        let mut request = self
            .http
            .get(format!("{}/api/rooms/{}/messages", self.base_url, room_id))
            .bearer_auth(&self.token);

        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        Ok(check(request.send().await?).await?.json().await?)
    }

    pub async fn send_message(&self, receiver_id: &str, content: &str) -> ClientResult<Message> {
        let response = self
            .http
            .post(format!("{}/api/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "receiver_id": receiver_id, "content": content }))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn mark_room_read(&self, room_id: &str) -> ClientResult<u64> {
        let response = self
            .http
            .post(format!("{}/api/rooms/{}/read", self.base_url, room_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body: MarkedBody = check(response).await?.json().await?;
        Ok(body.marked)
    }
}

async fn check(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| status.to_string());

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
