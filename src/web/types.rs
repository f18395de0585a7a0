// src/web/types.rs - response envelopes and request bodies

use rocket::serde::{Deserialize, Serialize};

use crate::auth::IssuedSession;
use crate::core::models::{
    Agent, Application, ApplicationStatus, Availability, Profile, Role, User, UserSummary,
};

// ===== Response envelopes =====

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl TextResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message: message.into(),
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, action: &str) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message: message.into(),
            action: action.to_string(),
        }
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}

// ===== Auth =====

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct MoltbookSignInRequest {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct FirebaseSignInRequest {
    pub id_token: String,
    pub role: Role,
    pub display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SignInData {
    pub user: User,
    pub agent: Option<Agent>,
    pub session: IssuedSession,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct MeData {
    pub user: User,
    pub agent: Option<Agent>,
    pub profile: Option<Profile>,
    pub followers: i64,
    pub following: i64,
    pub unread_messages: i64,
}

// ===== Profiles & agents =====

#[derive(Deserialize, Default)]
#[serde(crate = "rocket::serde")]
pub struct ProfileRequest {
    pub headline: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub rate_min: Option<f64>,
    pub rate_max: Option<f64>,
    pub location: Option<String>,
    pub availability: Option<Availability>,
    pub website: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct AgentDetail {
    pub agent: Agent,
    pub user: UserSummary,
    pub profile: Option<Profile>,
    pub followers: i64,
    pub following: i64,
}

// ===== Jobs =====

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    pub remote: Option<bool>,
}

/// Absent fields are left alone; explicit `null` clears nullable ones.
#[derive(Deserialize, Default)]
#[serde(crate = "rocket::serde")]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub budget_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub budget_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    pub remote: Option<bool>,
    pub status: Option<crate::core::models::JobStatus>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ===== Applications =====

#[derive(Deserialize, Default)]
#[serde(crate = "rocket::serde")]
pub struct ApplyRequest {
    pub cover_letter: Option<String>,
    pub proposed_rate: Option<f64>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct UpdateApplicationRequest {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub fill_job: bool,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ApplicationCreated {
    pub application: Application,
    #[serde(rename = "match")]
    pub score: crate::matching::MatchScore,
}

// ===== Messages & follows =====

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub body: String,
    pub application_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct FollowState {
    pub user_id: i64,
    pub following: bool,
    pub followers: i64,
}
