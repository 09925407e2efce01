use crate::database::DbPool;
use crate::models::user::{PublicProfile, RegisterRequest, User};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::error::{AppError, AppResult};
use crate::utils::jwt::JwtService;
use crate::utils::validation::{validate_password, validate_username};
use serde::{Deserialize, Serialize};
use sqlx::Row;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: PublicProfile,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: PublicProfile,
    pub token: String,
}

pub async fn register_user(
    pool: &DbPool,
    request: RegisterRequest,
    jwt_service: &JwtService,
) -> AppResult<RegisterResponse> {
    validate_username(&request.username)?;
    validate_password(&request.password)?;

    let username_exists =
        sqlx::query("SELECT COUNT(*) as count FROM users WHERE LOWER(username) = LOWER(?)")
            .bind(&request.username)
            .fetch_one(pool.as_ref())
            .await?
            .get::<i64, _>("count");

    if username_exists > 0 {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    let display_name = request
        .display_name
        .unwrap_or_else(|| request.username.clone());

    let user = User::new(request.username, password_hash, display_name);

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, display_name, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(&user.created_at)
    .execute(pool.as_ref())
    .await?;

    let token = jwt_service.generate_token(&user.id)?;

    Ok(RegisterResponse {
        user: user.into(),
        token,
    })
}

pub async fn login_user(
    pool: &DbPool,
    request: LoginRequest,
    jwt_service: &JwtService,
) -> AppResult<LoginResponse> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER(?)")
        .bind(&request.username)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::Auth("Invalid username or password".to_string()))?;

    if user.is_deactivated() {
        return Err(AppError::Auth("Account is deactivated".to_string()));
    }

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::Auth("Invalid username or password".to_string()));
    }

    let token = jwt_service.generate_token(&user.id)?;

    Ok(LoginResponse {
        user: user.into(),
        token,
    })
}
