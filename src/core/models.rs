// src/core/models.rs
//! Row types for the MoltIn schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::matching::{CandidateCriteria, JobCriteria, MatchCandidate, RateRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Company,
    Candidate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Company => "company",
            Role::Candidate => "candidate",
        }
    }

    /// Agents and candidates apply to jobs; companies only post them.
    pub fn can_apply(&self) -> bool {
        matches!(self, Role::Agent | Role::Candidate)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "company" => Ok(Role::Company),
            "candidate" => Ok(Role::Candidate),
            other => anyhow::bail!("Unknown role: {}. Use agent, company or candidate", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AuthProvider {
    Moltbook,
    Firebase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, rocket::FromFormField)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Busy,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, rocket::FromFormField)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Open,
    Closed,
    Filled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, rocket::FromFormField)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub auth_provider: AuthProvider,
    #[serde(skip_serializing)]
    pub external_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub user_id: i64,
    pub moltbook_name: String,
    pub description: Option<String>,
    pub karma: i64,
    pub follower_count: i64,
    pub owner_handle: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// Agent listing row: agent joined with its user and profile headline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentSummary {
    pub user_id: i64,
    pub moltbook_name: String,
    pub description: Option<String>,
    pub karma: i64,
    pub follower_count: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub headline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub headline: Option<String>,
    pub bio: Option<String>,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub rate_min: Option<f64>,
    pub rate_max: Option<f64>,
    pub location: Option<String>,
    pub availability: Availability,
    pub website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn rate(&self) -> RateRange {
        RateRange::new(self.rate_min, self.rate_max)
    }
}

/// Profile browse row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProfileCard {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: Profile,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    pub poster_id: i64,
    pub title: String,
    pub description: String,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    pub remote: bool,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn budget(&self) -> RateRange {
        RateRange::new(self.budget_min, self.budget_max)
    }

    pub fn criteria(&self) -> JobCriteria<'_> {
        JobCriteria {
            skills: &self.skills,
            budget: self.budget(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

/// An open job as seen by a prospective applicant.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobForViewer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: Job,
    pub viewer_follows_poster: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub applicant_id: i64,
    pub cover_letter: Option<String>,
    pub proposed_rate: Option<f64>,
    pub match_score: f64,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApplicationView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: Application,
    pub job_title: String,
    pub applicant_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub application_id: Option<i64>,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Agent with everything the scorer needs, relative to one job poster.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentMatchRow {
    pub user_id: i64,
    pub moltbook_name: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub karma: i64,
    pub headline: Option<String>,
    pub availability: Availability,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub rate_min: Option<f64>,
    pub rate_max: Option<f64>,
    pub follows_poster: bool,
}

impl MatchCandidate for AgentMatchRow {
    fn criteria(&self) -> CandidateCriteria<'_> {
        CandidateCriteria {
            id: self.user_id,
            skills: &self.skills,
            rate: RateRange::new(self.rate_min, self.rate_max),
            karma: self.karma,
            follows_poster: self.follows_poster,
        }
    }
}
