// src/web/handlers/agent_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::core::models::AgentSummary;
use crate::core::repositories::{AgentRepository, FollowRepository, ProfileRepository, UserRepository};
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::web::types::{AgentDetail, DataResponse};

pub async fn list_agents_handler(
    q: Option<String>,
    params: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<AgentSummary>>>> {
    let (agents, total) = AgentRepository::new(db.pool())
        .list(q.as_deref(), &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} agents", total),
        Page::new(agents, &params, total),
    )))
}

pub async fn get_agent_handler(
    name: &str,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<AgentDetail>>> {
    let pool = db.pool();

    let agent = AgentRepository::new(pool)
        .find_by_name(name)
        .await?
        .ok_or_else(|| ApiError::not_found("Agent"))?;
    let user = UserRepository::new(pool)
        .find_by_id(agent.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Agent"))?;
    let profile = ProfileRepository::new(pool).find(agent.user_id).await?;
    let (followers, following) = FollowRepository::new(pool).counts(agent.user_id).await?;

    Ok(Json(DataResponse::success(
        format!("Agent {}", agent.moltbook_name),
        AgentDetail {
            user: user.summary(),
            agent,
            profile,
            followers,
            following,
        },
    )))
}
