// src/auth/mod.rs
pub mod firebase;
pub mod moltbook;
pub mod session;

pub use firebase::{AuthConfig, FirebaseUser};
pub use moltbook::{AgentVerifier, MoltbookAgent, MoltbookClient, MoltbookError};
pub use session::{IssuedSession, SessionClaims, SessionManager, SESSION_COOKIE};

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

use crate::app_log;
use crate::core::models::{Role, User};
use crate::core::repositories::UserRepository;
use crate::core::Database;
use crate::error::ApiError;

/// Signed-in user, resolved from the session JWT.
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: SessionClaims,
}

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Bearer header first, then the session cookie.
fn session_token(req: &Request<'_>) -> Option<String> {
    if let Some(header) = req.headers().get_one("Authorization") {
        return header
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string());
    }
    req.cookies()
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn unauthorized(message: &str) -> Outcome<AuthenticatedUser, ApiError> {
    Outcome::Error((
        Status::Unauthorized,
        ApiError::Unauthorized(message.to_string()),
    ))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (Some(sessions), Some(database)) = (
            req.rocket().state::<SessionManager>(),
            req.rocket().state::<Database>(),
        ) else {
            app_log!(error, "Session manager or database not managed");
            return Outcome::Error((
                Status::InternalServerError,
                ApiError::Internal(anyhow::anyhow!("auth state missing")),
            ));
        };

        let Some(token) = session_token(req) else {
            app_log!(debug, "Missing session token");
            return unauthorized("Authorization token required");
        };

        let claims = match sessions.verify(&token) {
            Ok(claims) => claims,
            Err(e) => {
                app_log!(warn, "Session verification failed: {:#}", e);
                return unauthorized("Session token verification failed");
            }
        };

        let user_id = match claims.user_id() {
            Ok(id) => id,
            Err(_) => return unauthorized("Invalid session subject"),
        };

        match UserRepository::new(database.pool()).find_by_id(user_id).await {
            Ok(Some(user)) => Outcome::Success(AuthenticatedUser { user, claims }),
            Ok(None) => {
                app_log!(warn, "Session for unknown user {}", user_id);
                unauthorized("User no longer exists")
            }
            Err(e) => {
                app_log!(error, "Failed to load session user {}: {}", user_id, e);
                Outcome::Error((Status::InternalServerError, ApiError::Internal(e)))
            }
        }
    }
}

// Optional auth guard that doesn't fail if no auth is provided
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}
