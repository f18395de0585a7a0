// src/web/handlers/application_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::AuthenticatedUser;
use crate::core::models::{Application, ApplicationStatus, ApplicationView};
use crate::core::repositories::{ApplicationRepository, JobRepository, NewApplication};
use crate::core::{Database, MatchService};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::web::handlers::job_handlers::load_own_job;
use crate::web::types::{ApplicationCreated, ApplyRequest, DataResponse, UpdateApplicationRequest};
use crate::web::validation::{optional_text, validate_range, MAX_MESSAGE_LEN};

pub async fn apply_handler(
    job_id: i64,
    request: Json<ApplyRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ApplicationCreated>>> {
    let pool = db.pool();

    if !auth.role().can_apply() {
        return Err(ApiError::forbidden(format!(
            "Accounts with role {} cannot apply to jobs",
            auth.role()
        )));
    }

    let job = JobRepository::new(pool)
        .find(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    if !job.is_open() {
        return Err(ApiError::bad_request("Job is not open for applications"));
    }
    if job.poster_id == auth.id() {
        return Err(ApiError::bad_request("You cannot apply to your own job"));
    }

    let request = request.into_inner();
    validate_range(request.proposed_rate, None, "Proposed rate")?;
    let cover_letter = optional_text(request.cover_letter, "Cover letter", MAX_MESSAGE_LEN)?;

    let applications = ApplicationRepository::new(pool);
    if applications.exists_for(job.id, auth.id()).await? {
        return Err(ApiError::Conflict(
            "You have already applied to this job".to_string(),
        ));
    }

    let score = MatchService::new(pool).score_user(&job, auth.id()).await?;
    let application = applications
        .create(&NewApplication {
            job_id: job.id,
            applicant_id: auth.id(),
            cover_letter,
            proposed_rate: request.proposed_rate,
            match_score: score.score,
        })
        .await?;

    Ok(Json(DataResponse::success(
        format!("Applied to {}", job.title),
        ApplicationCreated { application, score },
    )))
}

pub async fn job_applications_handler(
    job_id: i64,
    status: Option<ApplicationStatus>,
    params: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ApplicationView>>>> {
    let job = load_own_job(db, job_id, &auth).await?;
    let (items, total) = ApplicationRepository::new(db.pool())
        .list_for_job(job.id, status, &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} applications", total),
        Page::new(items, &params, total),
    )))
}

pub async fn my_applications_handler(
    status: Option<ApplicationStatus>,
    params: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ApplicationView>>>> {
    let (items, total) = ApplicationRepository::new(db.pool())
        .list_for_applicant(auth.id(), status, &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} applications", total),
        Page::new(items, &params, total),
    )))
}

pub async fn update_application_handler(
    id: i64,
    request: Json<UpdateApplicationRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Application>>> {
    let pool = db.pool();
    let applications = ApplicationRepository::new(pool);

    let application = applications
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application"))?;
    let job = JobRepository::new(pool)
        .find(application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;

    let is_poster = job.poster_id == auth.id();
    let is_applicant = application.applicant_id == auth.id();
    if !is_poster && !is_applicant {
        return Err(ApiError::forbidden(
            "Only the applicant or the job poster can update this application",
        ));
    }

    match request.status {
        ApplicationStatus::Accepted | ApplicationStatus::Rejected if !is_poster => {
            return Err(ApiError::forbidden(
                "Only the job poster can accept or reject applications",
            ));
        }
        ApplicationStatus::Withdrawn if !is_applicant => {
            return Err(ApiError::forbidden(
                "Only the applicant can withdraw an application",
            ));
        }
        ApplicationStatus::Pending => {
            return Err(ApiError::bad_request(
                "Applications cannot be moved back to pending",
            ));
        }
        _ => {}
    }

    if application.status != ApplicationStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "Application is already {}",
            application.status
        )));
    }

    let updated = if request.status == ApplicationStatus::Accepted && request.fill_job {
        applications.accept_and_fill(application.id, job.id).await?
    } else {
        applications.set_status(application.id, request.status).await?
    }
    .ok_or_else(|| ApiError::Conflict("Application is no longer pending".to_string()))?;

    app_log!(
        info,
        "Application {} set to {} by user {}",
        updated.id,
        updated.status,
        auth.id()
    );

    Ok(Json(DataResponse::success("Application updated", updated)))
}
