use utoipa::OpenApi;
use crate::common::response::{DetailResponse, MessageResponse};
use crate::modules::auth::dto::*;
use crate::modules::content::dto::{UploadVideoForm, VideoResponse};
use crate::modules::content::model::{Resolution, Video, VideoStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::handler::register,
        crate::modules::auth::handler::activate,
        crate::modules::auth::handler::login,
        crate::modules::auth::handler::logout,
        crate::modules::auth::handler::refresh,
        crate::modules::auth::handler::password_reset,
        crate::modules::auth::handler::password_confirm,
        crate::modules::content::handler::list_videos,
        crate::modules::content::stream_handler::serve_manifest,
        crate::modules::content::stream_handler::serve_segment,
        crate::modules::content::handler::admin_list_videos,
        crate::modules::content::handler::upload_video,
        crate::modules::content::handler::delete_video,
    ),
    components(
        schemas(
            RegisterRequest, RegisterResponse, RegisteredUser,
            LoginRequest, LoginResponse, LoginUser, RefreshResponse,
            PasswordResetRequest, PasswordConfirmRequest,
            DetailResponse, MessageResponse,
            VideoResponse, Video, VideoStatus, Resolution, UploadVideoForm,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, activation, login and password reset"),
        (name = "Content", description = "Video catalogue and HLS playback"),
        (name = "Admin", description = "Staff video management")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme, HttpAuthScheme, HttpBuilder};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::modules::auth::handler::ACCESS_COOKIE,
                ))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/register/",
            "/api/login/",
            "/api/video/",
            "/api/video/{movie_id}/{resolution}/index.m3u8",
            "/admin/videos",
            "/admin/videos/{id}",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {}", expected);
        }
    }
}
