//! # User API Handlers
//!
//! Signup, login and the caller's own profile.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, unauthorized};
use crate::models::user::ReadUser;
use crate::repositories::{NewUser, UserRepository};
use crate::server::AppState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[schema(example = "alice")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// User name or email
    #[schema(example = "alice")]
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
}

fn users(state: &AppState) -> UserRepository {
    UserRepository::new(state.db.clone()).with_hash_cost(state.config.password_hash_cost)
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/user/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ReadUser),
        (status = 400, description = "Invalid name, email or password", body = ApiError),
        (status = 409, description = "Name or email already registered", body = ApiError)
    ),
    tag = "users"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ReadUser>), ApiError> {
    let user = users(&state)
        .create(NewUser {
            name: request.name,
            email: request.email,
            password: request.password,
        })
        .await?;

    tracing::info!(user_id = user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 401, description = "Bad credentials or inactive account", body = ApiError)
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = users(&state)
        .verify_credentials(&request.name, &request.password)
        .await?
        .ok_or_else(|| unauthorized(Some("Incorrect name or password")))?;

    let access_token = state.auth.issue(user.id).map_err(|err| {
        tracing::error!(user_id = user.id, error = %err, "Failed to issue access token");
        ApiError::from(anyhow::Error::new(err))
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// The authenticated caller
#[utoipa::path(
    get,
    path = "/user/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = ReadUser),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Account no longer exists", body = ApiError)
    ),
    tag = "users"
)]
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ReadUser>, ApiError> {
    let found = users(&state)
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| not_found("user"))?;
    Ok(Json(found.into()))
}
