// src/web/handlers/system_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::OptionalAuth;
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::web::types::TextResponse;

pub async fn health_handler(auth: OptionalAuth, db: &State<Database>) -> ApiResult<Json<TextResponse>> {
    match &auth.user {
        Some(user) => app_log!(debug, "Health check by user {}", user.id()),
        None => app_log!(debug, "Health check by anonymous client"),
    }

    db.health_check().await.map_err(|e| {
        app_log!(error, "Database health check failed: {:#}", e);
        ApiError::Unavailable("Database is unavailable".to_string())
    })?;

    Ok(Json(TextResponse::success("OK")))
}
