// src/web/handlers/follow_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::AuthenticatedUser;
use crate::core::models::UserSummary;
use crate::core::repositories::{FollowRepository, UserRepository};
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::web::types::{DataResponse, FollowState};

async fn ensure_user(db: &Database, user_id: i64) -> ApiResult<()> {
    if UserRepository::new(db.pool()).exists(user_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("User"))
    }
}

async fn follow_state(db: &Database, follower_id: i64, user_id: i64) -> ApiResult<FollowState> {
    let follows = FollowRepository::new(db.pool());
    let following = follows.is_following(follower_id, user_id).await?;
    let (followers, _) = follows.counts(user_id).await?;
    Ok(FollowState {
        user_id,
        following,
        followers,
    })
}

pub async fn follow_handler(
    user_id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FollowState>>> {
    if user_id == auth.id() {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }
    ensure_user(db, user_id).await?;

    if FollowRepository::new(db.pool())
        .follow(auth.id(), user_id)
        .await?
    {
        app_log!(info, "User {} now follows user {}", auth.id(), user_id);
    }

    let state = follow_state(db, auth.id(), user_id).await?;
    Ok(Json(DataResponse::success("Following", state)))
}

pub async fn unfollow_handler(
    user_id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FollowState>>> {
    ensure_user(db, user_id).await?;
    FollowRepository::new(db.pool())
        .unfollow(auth.id(), user_id)
        .await?;

    let state = follow_state(db, auth.id(), user_id).await?;
    Ok(Json(DataResponse::success("Not following", state)))
}

pub async fn followers_handler(
    user_id: i64,
    params: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<UserSummary>>>> {
    ensure_user(db, user_id).await?;
    let (users, total) = FollowRepository::new(db.pool())
        .followers(user_id, &params)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} followers", total),
        Page::new(users, &params, total),
    )))
}

pub async fn following_handler(
    user_id: i64,
    params: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<UserSummary>>>> {
    ensure_user(db, user_id).await?;
    let (users, total) = FollowRepository::new(db.pool())
        .following(user_id, &params)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} following", total),
        Page::new(users, &params, total),
    )))
}
