use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::error::AppError;

/// Bearer token authentication middleware.
/// Validates the JWT and stores the resulting `AuthUser` in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_bearer_token(&req) else {
        tracing::warn!("Missing bearer token");
        return Err(AppError::Auth("Missing bearer token".to_string()));
    };

    let user = state.jwt_validator.authenticate(token)?;
    tracing::debug!(user_id = user.user_id, "Request authenticated");

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}
