use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::{
    error::Result,
    models::{claims::Claims, course::CourseView},
    services::courses::{self as course_service, CourseOperation},
    state::AppState,
    upload::read_submission,
};

/// The response payload for course creation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseResponse {
    pub message: &'static str,
    pub course: CourseView,
    pub image_url: Option<String>,
}

/// The response payload for course updates.
#[derive(Serialize)]
pub struct UpdateCourseResponse {
    pub message: &'static str,
    pub course: CourseView,
}

/// A bare message response.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Creates a course owned by the caller.
#[axum::debug_handler]
pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    request: Request,
) -> Result<Response> {
    course_service::require_teacher(&claims, CourseOperation::Create)?;

    let submission = read_submission(request, &state.course_uploads).await?;
    let (course, image_url) = course_service::create_course(&state, &claims, submission).await?;

    let response = CreateCourseResponse {
        message: "Course created successfully",
        course,
        image_url,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Lists every course, newest first.
#[axum::debug_handler]
pub async fn list_courses(State(state): State<AppState>) -> Result<Response> {
    let courses = course_service::list_courses(&state).await?;
    Ok((StatusCode::OK, Json(courses)).into_response())
}

/// Lists the caller's own courses.
#[axum::debug_handler]
pub async fn my_courses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let courses = course_service::list_my_courses(&state, &claims).await?;
    Ok((StatusCode::OK, Json(courses)).into_response())
}

/// Updates a course the caller owns.
#[axum::debug_handler]
pub async fn update_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
    request: Request,
) -> Result<Response> {
    course_service::require_teacher(&claims, CourseOperation::Update)?;

    let submission = read_submission(request, &state.course_uploads).await?;
    let course = course_service::update_course(&state, &claims, &course_id, submission).await?;

    let response = UpdateCourseResponse {
        message: "Course updated successfully",
        course,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Deletes a course the caller owns.
#[axum::debug_handler]
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<String>,
) -> Result<Response> {
    course_service::delete_course(&state, &claims, &course_id).await?;

    let response = MessageResponse {
        message: "Course deleted successfully",
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
