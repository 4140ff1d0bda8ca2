use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod dto;
pub mod emails;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;
pub mod tokens;

/// Account endpoints; none of them require an authenticated user.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(handler::register))
        .route("/activate/{uidb64}/{token}/", get(handler::activate))
        .route("/login/", post(handler::login))
        .route("/logout/", post(handler::logout))
        .route("/token/refresh/", post(handler::refresh))
        .route("/password_reset/", post(handler::password_reset))
        .route("/password_confirm/{uidb64}/{token}/", post(handler::password_confirm))
}
