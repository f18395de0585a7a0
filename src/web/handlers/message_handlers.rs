// src/web/handlers/message_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::AuthenticatedUser;
use crate::core::models::Message;
use crate::core::repositories::{
    ApplicationRepository, JobRepository, MessageRepository, UserRepository,
};
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::web::types::{DataResponse, SendMessageRequest, UnreadCount};
use crate::web::validation::{require_text, MAX_MESSAGE_LEN};

/// A message tied to an application must travel between its applicant and the job poster.
async fn check_application_thread(
    db: &Database,
    application_id: i64,
    sender_id: i64,
    recipient_id: i64,
) -> ApiResult<()> {
    let application = ApplicationRepository::new(db.pool())
        .find(application_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application"))?;
    let job = JobRepository::new(db.pool())
        .find(application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;

    let mut pair = [sender_id, recipient_id];
    let mut expected = [application.applicant_id, job.poster_id];
    pair.sort_unstable();
    expected.sort_unstable();

    if pair != expected {
        return Err(ApiError::forbidden(
            "Application messages are limited to the applicant and the job poster",
        ));
    }
    Ok(())
}

pub async fn send_message_handler(
    request: Json<SendMessageRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Message>>> {
    let body = require_text(&request.body, "Message body", MAX_MESSAGE_LEN)?;

    if request.recipient_id == auth.id() {
        return Err(ApiError::bad_request("You cannot message yourself"));
    }
    if !UserRepository::new(db.pool())
        .exists(request.recipient_id)
        .await?
    {
        return Err(ApiError::not_found("Recipient"));
    }
    if let Some(application_id) = request.application_id {
        check_application_thread(db, application_id, auth.id(), request.recipient_id).await?;
    }

    let message = MessageRepository::new(db.pool())
        .create(auth.id(), request.recipient_id, request.application_id, &body)
        .await?;

    app_log!(
        info,
        "Message {} sent from user {} to user {}",
        message.id,
        message.sender_id,
        message.recipient_id
    );

    Ok(Json(DataResponse::success("Message sent", message)))
}

pub async fn inbox_handler(
    unread_only: Option<bool>,
    params: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Message>>>> {
    let (messages, total) = MessageRepository::new(db.pool())
        .inbox(auth.id(), unread_only.unwrap_or(false), &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} messages", total),
        Page::new(messages, &params, total),
    )))
}

pub async fn conversation_handler(
    user_id: i64,
    params: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Message>>>> {
    let (messages, total) = MessageRepository::new(db.pool())
        .conversation(auth.id(), user_id, &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} messages", total),
        Page::new(messages, &params, total),
    )))
}

pub async fn mark_read_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Message>>> {
    let messages = MessageRepository::new(db.pool());
    let message = messages
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;

    if message.recipient_id != auth.id() {
        return Err(ApiError::forbidden(
            "Only the recipient can mark a message as read",
        ));
    }

    let message = messages.mark_read(message.id).await?;
    Ok(Json(DataResponse::success("Message marked as read", message)))
}

pub async fn unread_count_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<UnreadCount>>> {
    let unread = MessageRepository::new(db.pool())
        .unread_count(auth.id())
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} unread", unread),
        UnreadCount { unread },
    )))
}
