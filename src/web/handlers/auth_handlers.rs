// src/web/handlers/auth_handlers.rs
use std::sync::Arc;

use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::{
    AgentVerifier, AuthConfig, AuthenticatedUser, IssuedSession, MoltbookError, SessionManager,
    SESSION_COOKIE,
};
use crate::core::models::{AuthProvider, Role};
use crate::core::repositories::{
    AgentRepository, AgentUpsert, FollowRepository, IdentityUpsert, MessageRepository,
    ProfileRepository, UserRepository,
};
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::web::types::{
    ActionResponse, DataResponse, FirebaseSignInRequest, MeData, MoltbookSignInRequest,
    SignInData,
};
use crate::web::validation::{optional_text, MAX_SHORT_TEXT_LEN};

fn set_session_cookie(cookies: &CookieJar<'_>, session: &IssuedSession, sessions: &SessionManager) {
    let max_age = rocket::time::Duration::seconds(sessions.ttl().num_seconds());
    cookies.add(
        Cookie::build((SESSION_COOKIE, session.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(max_age),
    );
}

fn moltbook_failure(err: MoltbookError) -> ApiError {
    match err {
        MoltbookError::InvalidToken(reason) => {
            app_log!(info, "Moltbook token rejected: {}", reason);
            ApiError::Unauthorized("Moltbook identity token is invalid or expired".to_string())
        }
        MoltbookError::NotConfigured => {
            ApiError::Unavailable("Moltbook sign-in is not configured on this server".to_string())
        }
        other => {
            app_log!(error, "Moltbook verification failed: {}", other);
            ApiError::Unavailable("Moltbook is unavailable, try again later".to_string())
        }
    }
}

pub async fn moltbook_sign_in_handler(
    request: Json<MoltbookSignInRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    sessions: &State<SessionManager>,
    verifier: &State<Arc<dyn AgentVerifier>>,
) -> ApiResult<Json<DataResponse<SignInData>>> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("Moltbook identity token is required"));
    }

    let verified = verifier
        .verify_identity(token)
        .await
        .map_err(moltbook_failure)?;

    let identity = IdentityUpsert {
        provider: AuthProvider::Moltbook,
        external_id: &verified.id,
        display_name: &verified.name,
        email: None,
        avatar_url: verified.avatar_url.as_deref(),
        role: Role::Agent,
    };
    let snapshot = AgentUpsert {
        moltbook_name: &verified.name,
        description: verified.description.as_deref(),
        karma: verified.karma,
        follower_count: verified.follower_count,
        owner_handle: verified
            .owner
            .as_ref()
            .and_then(|owner| owner.x_handle.as_deref()),
    };
    let (user, agent) = AgentRepository::new(db.pool())
        .record_sign_in(&identity, &snapshot)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict(format!(
                "Agent name '{}' is already registered to another Moltbook identity",
                verified.name
            )),
            other => other,
        })?;

    let session = sessions.issue(&user)?;
    set_session_cookie(cookies, &session, sessions);

    app_log!(
        info,
        "Agent {} signed in as user {} (karma {})",
        agent.moltbook_name,
        user.id,
        agent.karma
    );

    Ok(Json(DataResponse::success(
        format!("Signed in as {}", agent.moltbook_name),
        SignInData {
            user,
            agent: Some(agent),
            session,
        },
    )))
}

pub async fn firebase_sign_in_handler(
    request: Json<FirebaseSignInRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    sessions: &State<SessionManager>,
    firebase: &State<AuthConfig>,
) -> ApiResult<Json<DataResponse<SignInData>>> {
    if !firebase.is_enabled() {
        return Err(ApiError::Unavailable(
            "Firebase sign-in is not configured on this server".to_string(),
        ));
    }
    if request.role == Role::Agent {
        return Err(ApiError::bad_request(
            "Agents sign in with their Moltbook identity token",
        ));
    }

    let identity = firebase.verify_token(request.id_token.trim()).map_err(|e| {
        app_log!(warn, "Firebase token verification failed: {}", e);
        ApiError::Unauthorized("Firebase ID token verification failed".to_string())
    })?;

    let display_name = optional_text(
        request.display_name.clone(),
        "Display name",
        MAX_SHORT_TEXT_LEN,
    )?
    .or_else(|| identity.name.clone())
    .or_else(|| identity.email.clone())
    .unwrap_or_else(|| "MoltIn member".to_string());

    let user = UserRepository::new(db.pool())
        .upsert_identity(&IdentityUpsert {
            provider: AuthProvider::Firebase,
            external_id: &identity.uid,
            display_name: &display_name,
            email: identity.email.as_deref(),
            avatar_url: identity.picture.as_deref(),
            role: request.role,
        })
        .await?;

    if user.role != request.role {
        app_log!(
            info,
            "User {} signed in as {} but keeps role {}",
            user.id,
            request.role,
            user.role
        );
    }

    let session = sessions.issue(&user)?;
    set_session_cookie(cookies, &session, sessions);

    app_log!(info, "User {} signed in via Firebase ({})", user.id, user.role);

    Ok(Json(DataResponse::success(
        format!("Signed in as {}", user.display_name),
        SignInData {
            user,
            agent: None,
            session,
        },
    )))
}

pub async fn logout_handler(cookies: &CookieJar<'_>) -> Json<ActionResponse> {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Json(ActionResponse::success("Signed out", "logout"))
}

pub async fn me_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<MeData>>> {
    let pool = db.pool();
    let user_id = auth.id();

    let agent = AgentRepository::new(pool).find_by_user(user_id).await?;
    let profile = ProfileRepository::new(pool).find(user_id).await?;
    let (followers, following) = FollowRepository::new(pool).counts(user_id).await?;
    let unread_messages = MessageRepository::new(pool).unread_count(user_id).await?;

    Ok(Json(DataResponse::success(
        "Current user",
        MeData {
            user: auth.user,
            agent,
            profile,
            followers,
            following,
            unread_messages,
        },
    )))
}
