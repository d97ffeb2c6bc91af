use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::Result,
    models::claims::Claims,
    services::entities as entity_service,
    state::AppState,
    upload::read_submission,
};

/// Returns the caller's own profile.
#[axum::debug_handler]
pub async fn get_entity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let entity = entity_service::get_profile(&state, &claims).await?;
    Ok((StatusCode::OK, Json(entity)).into_response())
}

/// Lists all students. Teachers only.
#[axum::debug_handler]
pub async fn list_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let students = entity_service::list_students(&state, &claims).await?;
    Ok((StatusCode::OK, Json(students)).into_response())
}

/// Updates the caller's own profile, optionally replacing the profile image.
#[axum::debug_handler]
pub async fn update_entity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    request: Request,
) -> Result<Response> {
    tracing::info!("✏️ Profile update for: {}", claims.sub);

    let submission = read_submission(request, &state.profile_uploads).await?;
    let entity = entity_service::update_profile(&state, &claims, submission).await?;

    Ok((StatusCode::OK, Json(entity)).into_response())
}
