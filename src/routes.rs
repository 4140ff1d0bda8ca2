use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use crate::docs::ApiDoc;
use axum::Router;
use crate::state::AppState;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let api = api_routes()
        .merge(crate::modules::auth::router())
        .merge(crate::modules::content::router(state.clone()));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .nest("/admin", crate::modules::content::admin_router(state))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
}
