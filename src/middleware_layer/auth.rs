use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Extracts the bearer token from the `Authorization` header.
///
/// The header must be exactly two space-delimited parts, `Bearer <token>`.
///
/// # Arguments
///
/// * `headers` - The request headers.
///
/// # Returns
///
/// An `Option` containing the raw token if the header is well formed.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// A middleware that requires a valid bearer token.
///
/// On success the verified [`Claims`](crate::models::claims::Claims) are
/// attached to the request extensions. Every failure is a terminal 401.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an `AppError::Unauthorized`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_bearer_token(request.headers()).ok_or_else(|| {
        tracing::warn!("❌ Missing or malformed Authorization header");
        AppError::Unauthorized("Unauthorized".to_string())
    })?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!("❌ Token rejected: {}", e);
        AppError::Unauthorized("Unauthorized".to_string())
    })?;

    tracing::debug!("✅ Entity authenticated: {}", claims.sub);

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_the_exact_bearer_form() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        for value in [
            "Bearer",
            "Bearer ",
            "Basic abc",
            "bearer abc",
            "Bearer abc extra",
            "Bearer  abc",
            "abc",
        ] {
            assert_eq!(extract_bearer_token(&headers_with(value)), None, "{value}");
        }
    }
}
