use axum::Router;
use axum::routing::{delete, get};
use crate::state::AppState;
use axum::middleware;

pub mod handler;
pub mod stream_handler;
pub mod events;
pub mod dto;
pub mod model;
pub mod repository;
pub mod service;

/// Catalogue and HLS playback; every route needs a logged-in user.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/video/", get(handler::list_videos))
        .route("/video/{movie_id}/{resolution}/index.m3u8", get(stream_handler::serve_manifest))
        .route("/video/{movie_id}/{resolution}/{segment}", get(stream_handler::serve_segment))
        .route("/video/{movie_id}/{resolution}/{segment}/", get(stream_handler::serve_segment))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}

/// Staff-only video management.
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/videos", get(handler::admin_list_videos).post(handler::upload_video))
        .route("/videos/{id}", delete(handler::delete_video))
        .route_layer(middleware::from_fn(crate::middleware::role::staff_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
