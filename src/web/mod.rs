// src/web/mod.rs
pub mod handlers;
pub mod types;
pub mod validation;

pub use types::*;

use std::sync::Arc;

use anyhow::{Context, Result};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::{CookieJar, Header, Status};
use rocket::serde::json::Json;
use rocket::{
    catch, catchers, delete, get, options, patch, post, put, routes, Build, Request, Response,
    Rocket, State,
};

use crate::app_log;
use crate::auth::{AgentVerifier, AuthConfig, AuthenticatedUser, MoltbookClient, OptionalAuth, SessionManager};
use crate::core::match_service::RecommendedJob;
use crate::core::models::{
    AgentMatchRow, AgentSummary, Application, ApplicationStatus, ApplicationView, Availability,
    Job, JobStatus, Message, Profile, ProfileCard, UserSummary,
};
use crate::core::Database;
use crate::environment::EnvironmentConfig;
use crate::error::{ApiError, ApiResult};
use crate::matching::{MatchScore, Ranked};
use crate::pagination::{Page, PageParams};
use crate::rate_limit::{RateLimited, RateLimiter, RetryAfter};

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        // Credentialed requests need the concrete origin echoed back.
        let origin = request.headers().get_one("Origin").unwrap_or("*").to_string();
        response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, PATCH, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        response.set_header(Header::new("Vary", "Origin"));
    }
}

/// Everything the routes pull from managed state.
pub struct AppServices {
    pub database: Database,
    pub sessions: SessionManager,
    pub moltbook: Arc<dyn AgentVerifier>,
    pub firebase: AuthConfig,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppServices {
    pub async fn from_config(config: &EnvironmentConfig) -> Result<Self> {
        let database = Database::new(&config.database_path).await?;

        let moltbook = MoltbookClient::new(
            &config.moltbook.base_url,
            config.moltbook_app_key.clone(),
            config.moltbook.timeout_seconds,
        )?;
        if config.moltbook_app_key.is_none() {
            app_log!(warn, "MOLTBOOK_APP_KEY not set, agent sign-in will be unavailable");
        }

        let mut firebase = AuthConfig::new(config.firebase_project_id.clone());
        firebase
            .update_firebase_keys()
            .await
            .context("Failed to fetch Firebase keys")?;
        if !firebase.is_enabled() {
            app_log!(info, "No Firebase project configured, company sign-in disabled");
        }

        Ok(Self {
            database,
            sessions: SessionManager::new(&config.session_secret, config.session_ttl_hours),
            moltbook: Arc::new(moltbook),
            firebase,
            rate_limiter: Some(RateLimiter::new((&config.rate_limit).into())),
        })
    }
}

// ===== System & auth =====

#[get("/health")]
pub async fn health(auth: OptionalAuth, db: &State<Database>) -> ApiResult<Json<TextResponse>> {
    handlers::health_handler(auth, db).await
}

#[post("/auth/moltbook", data = "<request>")]
pub async fn moltbook_sign_in(
    _limit: RateLimited,
    request: Json<MoltbookSignInRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    sessions: &State<SessionManager>,
    verifier: &State<Arc<dyn AgentVerifier>>,
) -> ApiResult<Json<DataResponse<SignInData>>> {
    handlers::moltbook_sign_in_handler(request, cookies, db, sessions, verifier).await
}

#[post("/auth/firebase", data = "<request>")]
pub async fn firebase_sign_in(
    _limit: RateLimited,
    request: Json<FirebaseSignInRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    sessions: &State<SessionManager>,
    firebase: &State<AuthConfig>,
) -> ApiResult<Json<DataResponse<SignInData>>> {
    handlers::firebase_sign_in_handler(request, cookies, db, sessions, firebase).await
}

#[post("/auth/logout")]
pub async fn logout(cookies: &CookieJar<'_>) -> Json<ActionResponse> {
    handlers::logout_handler(cookies).await
}

#[get("/me")]
pub async fn me(auth: AuthenticatedUser, db: &State<Database>) -> ApiResult<Json<DataResponse<MeData>>> {
    handlers::me_handler(auth, db).await
}

// ===== Profiles & agents =====

#[get("/profiles?<skill>&<availability>&<page..>")]
pub async fn list_profiles(
    skill: Option<String>,
    availability: Option<Availability>,
    page: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ProfileCard>>>> {
    handlers::list_profiles_handler(skill, availability, page, db).await
}

#[get("/profiles/<user_id>")]
pub async fn get_profile(user_id: i64, db: &State<Database>) -> ApiResult<Json<DataResponse<ProfileCard>>> {
    handlers::get_profile_handler(user_id, db).await
}

#[put("/profiles/me", data = "<request>")]
pub async fn update_my_profile(
    _limit: RateLimited,
    request: Json<ProfileRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Profile>>> {
    handlers::update_my_profile_handler(request, auth, db).await
}

#[get("/agents?<q>&<page..>")]
pub async fn list_agents(
    q: Option<String>,
    page: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<AgentSummary>>>> {
    handlers::list_agents_handler(q, page, db).await
}

#[get("/agents/<name>")]
pub async fn get_agent(name: &str, db: &State<Database>) -> ApiResult<Json<DataResponse<AgentDetail>>> {
    handlers::get_agent_handler(name, db).await
}

// ===== Jobs =====

#[get("/jobs?<status>&<skill>&<q>&<poster_id>&<page..>")]
pub async fn list_jobs(
    status: Option<JobStatus>,
    skill: Option<String>,
    q: Option<String>,
    poster_id: Option<i64>,
    page: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Job>>>> {
    handlers::list_jobs_handler(status, skill, q, poster_id, page, db).await
}

#[get("/jobs/recommended?<limit>")]
pub async fn recommended_jobs(
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Vec<RecommendedJob>>>> {
    handlers::recommended_jobs_handler(limit, auth, db).await
}

#[get("/jobs/<id>")]
pub async fn get_job(id: i64, db: &State<Database>) -> ApiResult<Json<DataResponse<Job>>> {
    handlers::get_job_handler(id, db).await
}

#[post("/jobs", data = "<request>")]
pub async fn create_job(
    _limit: RateLimited,
    request: Json<CreateJobRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Job>>> {
    handlers::create_job_handler(request, auth, db).await
}

#[patch("/jobs/<id>", data = "<request>")]
pub async fn update_job(
    _limit: RateLimited,
    id: i64,
    request: Json<UpdateJobRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Job>>> {
    handlers::update_job_handler(id, request, auth, db).await
}

#[delete("/jobs/<id>")]
pub async fn delete_job(
    _limit: RateLimited,
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::delete_job_handler(id, auth, db).await
}

#[get("/jobs/<id>/matches?<limit>")]
pub async fn job_matches(
    id: i64,
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Vec<Ranked<AgentMatchRow>>>>> {
    handlers::job_matches_handler(id, limit, auth, db).await
}

#[get("/jobs/<id>/match")]
pub async fn my_job_match(
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<MatchScore>>> {
    handlers::my_job_match_handler(id, auth, db).await
}

// ===== Applications =====

#[post("/jobs/<id>/applications", data = "<request>")]
pub async fn apply(
    _limit: RateLimited,
    id: i64,
    request: Json<ApplyRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ApplicationCreated>>> {
    handlers::apply_handler(id, request, auth, db).await
}

#[get("/jobs/<id>/applications?<status>&<page..>")]
pub async fn job_applications(
    id: i64,
    status: Option<ApplicationStatus>,
    page: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ApplicationView>>>> {
    handlers::job_applications_handler(id, status, page, auth, db).await
}

#[get("/applications/mine?<status>&<page..>")]
pub async fn my_applications(
    status: Option<ApplicationStatus>,
    page: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ApplicationView>>>> {
    handlers::my_applications_handler(status, page, auth, db).await
}

#[patch("/applications/<id>", data = "<request>")]
pub async fn update_application(
    _limit: RateLimited,
    id: i64,
    request: Json<UpdateApplicationRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Application>>> {
    handlers::update_application_handler(id, request, auth, db).await
}

// ===== Messages =====

#[post("/messages", data = "<request>")]
pub async fn send_message(
    _limit: RateLimited,
    request: Json<SendMessageRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Message>>> {
    handlers::send_message_handler(request, auth, db).await
}

#[get("/messages?<unread_only>&<page..>")]
pub async fn inbox(
    unread_only: Option<bool>,
    page: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Message>>>> {
    handlers::inbox_handler(unread_only, page, auth, db).await
}

#[get("/messages/unread-count")]
pub async fn unread_count(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<UnreadCount>>> {
    handlers::unread_count_handler(auth, db).await
}

#[get("/messages/with/<user_id>?<page..>")]
pub async fn conversation(
    user_id: i64,
    page: PageParams,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<Message>>>> {
    handlers::conversation_handler(user_id, page, auth, db).await
}

#[post("/messages/<id>/read")]
pub async fn mark_read(
    _limit: RateLimited,
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Message>>> {
    handlers::mark_read_handler(id, auth, db).await
}

// ===== Follows =====

#[post("/users/<id>/follow")]
pub async fn follow(
    _limit: RateLimited,
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FollowState>>> {
    handlers::follow_handler(id, auth, db).await
}

#[delete("/users/<id>/follow")]
pub async fn unfollow(
    _limit: RateLimited,
    id: i64,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<FollowState>>> {
    handlers::unfollow_handler(id, auth, db).await
}

#[get("/users/<id>/followers?<page..>")]
pub async fn followers(
    id: i64,
    page: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<UserSummary>>>> {
    handlers::followers_handler(id, page, db).await
}

#[get("/users/<id>/following?<page..>")]
pub async fn following(
    id: i64,
    page: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<UserSummary>>>> {
    handlers::following_handler(id, page, db).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers

fn error_body(error: &str, code: &str, suggestions: &[&str]) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        error.to_string(),
        code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
    ))
}

#[catch(400)]
pub fn bad_request() -> (Status, Json<StandardErrorResponse>) {
    (
        Status::BadRequest,
        error_body(
            "Invalid request format",
            "BAD_REQUEST",
            &[
                "Check your request JSON format",
                "Verify all required fields are present",
            ],
        ),
    )
}

#[catch(401)]
pub fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Authentication required".to_string())
}

#[catch(403)]
pub fn forbidden() -> ApiError {
    ApiError::forbidden("Access denied")
}

#[catch(404)]
pub fn not_found() -> ApiError {
    ApiError::not_found("Resource")
}

#[catch(422)]
pub fn unprocessable() -> (Status, Json<StandardErrorResponse>) {
    (
        Status::UnprocessableEntity,
        error_body(
            "Request body could not be parsed",
            "VALIDATION_ERROR",
            &[
                "Check field names and value types",
                "Enum fields take lowercase values",
            ],
        ),
    )
}

#[catch(429)]
pub fn too_many_requests(req: &Request<'_>) -> ApiError {
    let RetryAfter(retry_after) = req.local_cache(|| RetryAfter(None));
    ApiError::RateLimited {
        retry_after: retry_after.unwrap_or(1),
    }
}

#[catch(500)]
pub fn internal_error() -> (Status, Json<StandardErrorResponse>) {
    (
        Status::InternalServerError,
        error_body(
            "Internal server error",
            "INTERNAL_ERROR",
            &[
                "Try again in a few moments",
                "Contact support if the problem persists",
            ],
        ),
    )
}

/// Assemble the application on top of `figment` without launching it.
pub fn build_rocket(figment: Figment, services: AppServices) -> Rocket<Build> {
    let mut rocket = rocket::custom(figment)
        .attach(Cors)
        .manage(services.database)
        .manage(services.sessions)
        .manage(services.moltbook)
        .manage(services.firebase);

    if let Some(limiter) = services.rate_limiter {
        rocket = rocket.manage(limiter);
    }

    rocket
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                too_many_requests,
                internal_error
            ],
        )
        .mount(
            "/api",
            routes![
                health,
                moltbook_sign_in,
                firebase_sign_in,
                logout,
                me,
                list_profiles,
                get_profile,
                update_my_profile,
                list_agents,
                get_agent,
                list_jobs,
                recommended_jobs,
                get_job,
                create_job,
                update_job,
                delete_job,
                job_matches,
                my_job_match,
                apply,
                job_applications,
                my_applications,
                update_application,
                send_message,
                inbox,
                unread_count,
                conversation,
                mark_read,
                follow,
                unfollow,
                followers,
                following,
                options,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: EnvironmentConfig) -> Result<()> {
    config.ensure_directories().await?;

    let services = AppServices::from_config(&config).await?;
    if let Some(limiter) = &services.rate_limiter {
        limiter.spawn_cleanup();
    }

    app_log!(info, "Starting MoltIn API server ({})", config.environment);
    app_log!(info, "Database: {}", config.database_path.display());
    app_log!(info, "Listening on {}:{}", config.address, config.port);

    let figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port));

    build_rocket(figment, services)
        .launch()
        .await
        .context("Rocket server failed")?;

    Ok(())
}
