use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use crate::config::settings::AppConfig;
use crate::state::AppState;
use tower_cookies::CookieManagerLayer;
use tower_http::compression::predicate::{DefaultPredicate, NotForContentType, Predicate};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Uploads are streamed to disk, so the cap only bounds a single source file.
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT, header::HeaderName::from_static("x-csrftoken")])
}

pub fn create_app(state: AppState) -> Router {
    // HLS segments and playlists are already compact; skip them.
    let compression = CompressionLayer::new().compress_when(
        DefaultPredicate::new()
            .and(NotForContentType::const_new("video/"))
            .and(NotForContentType::const_new("application/vnd.apple.mpegurl")),
    );

    crate::routes::configure_routes(state.clone())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(CookieManagerLayer::new())
        .layer(middleware::from_fn_with_state(state.clone(), crate::middleware::hosts::request_guard))
        .layer(compression)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        create_app(AppState::for_tests(AppConfig::for_tests()))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let response = app()
            .oneshot(Request::get("/api/health").header("host", "localhost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn video_list_requires_credentials() {
        let response = app()
            .oneshot(Request::get("/api/video/").header("host", "localhost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Authentication credentials were not provided."));
    }

    #[tokio::test]
    async fn garbage_bearer_token_is_rejected() {
        let response = app()
            .oneshot(
                Request::get("/api/video/1/720p/index.m3u8")
                    .header("host", "localhost")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_requires_credentials() {
        let response = app()
            .oneshot(Request::get("/admin/videos").header("host", "localhost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_without_refresh_cookie() {
        let response = app()
            .oneshot(Request::post("/api/logout/").header("host", "localhost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_without_cookie() {
        let response = app()
            .oneshot(Request::post("/api/token/refresh/").header("host", "localhost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords() {
        let body = r#"{"email":"a@example.com","password":"Secret123!","confirmed_password":"Other123!"}"#;
        let response = app()
            .oneshot(
                Request::post("/api/register/")
                    .header("host", "localhost")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn untrusted_origin_cannot_post() {
        let response = app()
            .oneshot(
                Request::post("/api/login/")
                    .header("host", "localhost")
                    .header("origin", "https://evil.example")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn disallowed_host_is_rejected() {
        let mut config = AppConfig::for_tests();
        config.allowed_hosts = vec!["api.videoflix.test".to_string()];
        let response = create_app(AppState::for_tests(config))
            .oneshot(Request::get("/api/health").header("host", "evil.example").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
