use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use kinora_core::AppError;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone)]
pub struct AuthState {
    pub master_api_key: String,
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized(reason: &str) -> Response {
    tracing::warn!(reason, "Admin authentication failed");
    HttpAppError(AppError::Unauthorized(reason.to_string())).into_response()
}

/// Admin routes require `Authorization: Bearer <MASTER_API_KEY>`.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized("Missing authorization header"),
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) => token,
        None => return unauthorized("Invalid authorization header format"),
    };

    if !secure_compare(token, &auth_state.master_api_key) {
        return unauthorized("Invalid API key");
    }

    next.run(request).await
}
