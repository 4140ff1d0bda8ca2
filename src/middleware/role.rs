use crate::common::error::AppError;
use crate::modules::auth::model::CurrentUser;
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};

pub async fn staff_guard(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.is_staff {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
