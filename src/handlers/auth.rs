use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::entity::{Entity, UserSummary},
    services::auth as auth_service,
    state::AppState,
    upload::read_submission,
};

/// The request payload for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// The response payload for registration.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub entity: Entity,
}

/// The response payload for login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserSummary,
}

/// Handles registration.
///
/// Accepts multipart (with an optional `profileImage` file), JSON or
/// URL-encoded bodies.
#[axum::debug_handler]
pub async fn register(State(state): State<AppState>, request: Request) -> Result<Response> {
    tracing::info!("📝 Register attempt");

    let submission = read_submission(request, &state.profile_uploads).await?;
    let entity = auth_service::register(&state, submission).await?;

    let response = RegisterResponse {
        message: "Entity registered successfully",
        entity,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles login.
///
/// Any malformed body is reported exactly like wrong credentials.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(payload) = payload.map_err(|e| {
        tracing::debug!("Unreadable login body: {}", e);
        AppError::InvalidCredentials
    })?;

    tracing::info!("🔐 Login attempt for: {}", payload.email);

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let (token, entity) =
        auth_service::authenticate(&state, &payload.email, payload.password).await?;

    let response = LoginResponse {
        message: "Entity authenticated successfully",
        token,
        user: UserSummary::from(&entity),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
