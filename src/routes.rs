use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use http::{header, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState, upload::PUBLIC_PREFIX};

/// Room for multipart framing and text fields on top of the largest file ceiling.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Builds the application router.
///
/// Public routes: health, registration, login and the course listing.
/// Everything else sits behind [`middleware_layer::auth::require_auth`].
/// Uploaded images are served under `/uploads`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .profile_image_max_bytes
        .max(state.config.course_image_max_bytes) as usize
        + BODY_LIMIT_SLACK;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/auth", post(handlers::auth::login))
        .route("/api/courses", get(handlers::courses::list_courses))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/entity",
            get(handlers::entities::get_entity).put(handlers::entities::update_entity),
        )
        .route("/api/students", get(handlers::entities::list_students))
        .route("/api/courses", post(handlers::courses::create_course))
        .route("/api/courses/my", get(handlers::courses::my_courses))
        .route(
            "/api/courses/{course_id}",
            put(handlers::courses::update_course).delete(handlers::courses::delete_course),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}
