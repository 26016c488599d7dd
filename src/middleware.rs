use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::{info, warn};

use crate::error::AppError;
use crate::handlers::AppState;

/// Rejects requests without the configured API key. A no-op when none is set.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(api_key) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header);

    if token == api_key {
        Ok(next.run(req).await)
    } else {
        Err(AppError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid or missing API key".to_string(),
        })
    }
}

pub async fn log_request(req: Request, next: Next) -> impl IntoResponse {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed().as_millis();
    if status.is_success() {
        info!("{} {} {} {}ms", method, uri, status.as_u16(), elapsed);
    } else {
        warn!("{} {} {} {}ms", method, uri, status.as_u16(), elapsed);
    }

    response
}
