// src/web/handlers/job_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::AuthenticatedUser;
use crate::core::match_service::RecommendedJob;
use crate::core::models::{AgentMatchRow, Job, JobStatus};
use crate::core::repositories::{JobFilter, JobRepository, JobUpdate, NewJob};
use crate::core::{Database, MatchService};
use crate::error::{ApiError, ApiResult};
use crate::matching::{MatchScore, Ranked};
use crate::pagination::{Page, PageParams};
use crate::web::types::{ActionResponse, CreateJobRequest, DataResponse, UpdateJobRequest};
use crate::web::validation::{
    clamp_limit, normalize_skills, optional_text, require_text, validate_range,
    MAX_DESCRIPTION_LEN, MAX_SHORT_TEXT_LEN, MAX_TITLE_LEN,
};

pub const DEFAULT_MATCH_LIMIT: usize = 10;
pub const MAX_MATCH_LIMIT: usize = 50;

impl CreateJobRequest {
    pub fn into_new_job(self) -> ApiResult<NewJob> {
        validate_range(self.budget_min, self.budget_max, "Budget")?;

        Ok(NewJob {
            title: require_text(&self.title, "Title", MAX_TITLE_LEN)?,
            description: require_text(&self.description, "Description", MAX_DESCRIPTION_LEN)?,
            skills: normalize_skills(self.skills)?,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            location: optional_text(self.location, "Location", MAX_SHORT_TEXT_LEN)?,
            remote: self.remote.unwrap_or(false),
        })
    }
}

impl UpdateJobRequest {
    pub fn into_update(self) -> ApiResult<JobUpdate> {
        let title = self
            .title
            .map(|title| require_text(&title, "Title", MAX_TITLE_LEN))
            .transpose()?;
        let description = self
            .description
            .map(|text| require_text(&text, "Description", MAX_DESCRIPTION_LEN))
            .transpose()?;
        let skills = self.skills.map(normalize_skills).transpose()?;
        let location = self
            .location
            .map(|location| optional_text(location, "Location", MAX_SHORT_TEXT_LEN))
            .transpose()?;

        Ok(JobUpdate {
            title,
            description,
            skills,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            location,
            remote: self.remote,
            status: self.status,
        })
    }
}

async fn load_job(db: &Database, id: i64) -> ApiResult<Job> {
    JobRepository::new(db.pool())
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))
}

/// Load a job the signed-in user posted.
pub(crate) async fn load_own_job(db: &Database, id: i64, auth: &AuthenticatedUser) -> ApiResult<Job> {
    let job = load_job(db, id).await?;
    if job.poster_id != auth.id() {
        return Err(ApiError::forbidden("Only the poster can manage this job"));
    }
    Ok(job)
}

pub async fn list_jobs_handler(
    status: Option<JobStatus>,
    skill: Option<String>,
    q: Option<String>,
    poster_id: Option<i64>,
    params: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Job>>>> {
    let filter = JobFilter {
        status: Some(status.unwrap_or(JobStatus::Open)),
        skill,
        query: q,
        poster_id,
    };
    let (jobs, total) = JobRepository::new(db.pool()).list(&filter, &params).await?;

    Ok(Json(DataResponse::success(
        format!("{} jobs", total),
        Page::new(jobs, &params, total),
    )))
}

pub async fn get_job_handler(id: i64, db: &State<Database>) -> ApiResult<Json<DataResponse<Job>>> {
    let job = load_job(db, id).await?;
    Ok(Json(DataResponse::success(job.title.clone(), job)))
}

pub async fn create_job_handler(
    request: Json<CreateJobRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Job>>> {
    let new_job = request.into_inner().into_new_job()?;
    let job = JobRepository::new(db.pool()).create(auth.id(), &new_job).await?;
    Ok(Json(DataResponse::success("Job posted", job)))
}

pub async fn update_job_handler(
    id: i64,
    request: Json<UpdateJobRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Job>>> {
    let mut job = load_own_job(db, id, &auth).await?;
    let update = request.into_inner().into_update()?;

    update.apply_to(&mut job);
    validate_range(job.budget_min, job.budget_max, "Budget")?;

    let saved = JobRepository::new(db.pool()).save(&job).await?;
    app_log!(info, "Job {} updated by user {}", saved.id, auth.id());

    Ok(Json(DataResponse::success("Job updated", saved)))
}

pub async fn delete_job_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    let job = load_own_job(db, id, &auth).await?;
    JobRepository::new(db.pool()).delete(job.id).await?;
    Ok(Json(ActionResponse::success(
        format!("Job {} deleted", job.id),
        "delete_job",
    )))
}

pub async fn job_matches_handler(
    id: i64,
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Vec<Ranked<AgentMatchRow>>>>> {
    let job = load_own_job(db, id, &auth).await?;
    let limit = clamp_limit(limit, DEFAULT_MATCH_LIMIT, MAX_MATCH_LIMIT);

    let matches = MatchService::new(db.pool())
        .matches_for_job(&job, limit)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} matching agents", matches.len()),
        matches,
    )))
}

pub async fn my_job_match_handler(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<MatchScore>>> {
    let job = load_job(db, id).await?;
    let score = MatchService::new(db.pool())
        .score_user(&job, auth.id())
        .await?;

    Ok(Json(DataResponse::success(
        format!("Match score {}", score.score),
        score,
    )))
}

pub async fn recommended_jobs_handler(
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Vec<RecommendedJob>>>> {
    let limit = clamp_limit(limit, DEFAULT_MATCH_LIMIT, MAX_MATCH_LIMIT);
    let jobs = MatchService::new(db.pool())
        .recommended_jobs(auth.id(), limit)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} recommended jobs", jobs.len()),
        jobs,
    )))
}
