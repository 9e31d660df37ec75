//! Request throttling middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::AppState;
use crate::http::routes::AppError;

/// Middleware rejecting requests once the global quota is spent
pub async fn throttle(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Request throttled");
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(request).await)
}
