use crate::common::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Rejects requests for hosts outside `ALLOWED_HOSTS` and unsafe
/// cross-origin requests from origins that are not trusted.
pub async fn request_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or("");

    if !state.config.is_allowed_host(host) {
        warn!("Rejected request for disallowed host '{}'", host);
        return Err(AppError::BadRequest("Invalid HTTP_HOST header.".to_string()));
    }

    let unsafe_method = !matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if unsafe_method {
        if let Some(origin) = req.headers().get(header::ORIGIN).and_then(|o| o.to_str().ok()) {
            if !state.config.is_trusted_origin(origin) {
                warn!("Rejected {} from untrusted origin '{}'", req.method(), origin);
                return Err(AppError::Forbidden("CSRF Failed: Origin checking failed.".to_string()));
            }
        }
    }

    Ok(next.run(req).await)
}
