// src/core/match_service.rs
//! Loads the rows the scorer needs and hands them to `matching`.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::app_log;
use crate::core::models::{AgentMatchRow, Job, JobForViewer};
use crate::core::repositories::{
    AgentRepository, ApplicationRepository, FollowRepository, JobRepository, ProfileRepository,
};
use crate::matching::{rank_candidates, score_match, CandidateCriteria, MatchScore, RateRange, Ranked};

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedJob {
    #[serde(flatten)]
    pub job: JobForViewer,
    #[serde(rename = "match")]
    pub score: MatchScore,
}

pub struct MatchService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MatchService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Score `user_id` against `job` from their profile, karma and follow state.
    pub async fn score_user(&self, job: &Job, user_id: i64) -> Result<MatchScore> {
        let profile = ProfileRepository::new(self.pool).find(user_id).await?;
        let karma = AgentRepository::new(self.pool).karma_of(user_id).await?;
        let follows_poster = FollowRepository::new(self.pool)
            .is_following(user_id, job.poster_id)
            .await?;

        let (skills, rate) = match &profile {
            Some(profile) => (profile.skills.as_slice(), profile.rate()),
            None => (&[][..], RateRange::default()),
        };

        Ok(score_match(
            &job.criteria(),
            &CandidateCriteria {
                id: user_id,
                skills,
                rate,
                karma,
                follows_poster,
            },
        ))
    }

    /// Best matching agents for a job.
    pub async fn matches_for_job(&self, job: &Job, limit: usize) -> Result<Vec<Ranked<AgentMatchRow>>> {
        let candidates = AgentRepository::new(self.pool)
            .match_candidates(job.poster_id)
            .await?;
        let mut ranked = rank_candidates(&job.criteria(), candidates);
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Open jobs ranked for one user, best first, newest first on ties.
    pub async fn recommended_jobs(&self, user_id: i64, limit: usize) -> Result<Vec<RecommendedJob>> {
        let profile = ProfileRepository::new(self.pool).find(user_id).await?;
        let karma = AgentRepository::new(self.pool).karma_of(user_id).await?;
        let jobs = JobRepository::new(self.pool).open_for_viewer(user_id).await?;

        let (skills, rate) = match &profile {
            Some(profile) => (profile.skills.as_slice(), profile.rate()),
            None => (&[][..], RateRange::default()),
        };

        let mut scored: Vec<RecommendedJob> = jobs
            .into_iter()
            .map(|job| {
                let score = score_match(
                    &job.job.criteria(),
                    &CandidateCriteria {
                        id: user_id,
                        skills,
                        rate,
                        karma,
                        follows_poster: job.viewer_follows_poster,
                    },
                );
                RecommendedJob { job, score }
            })
            .collect();

        // Stable sort keeps the newest-first order from the query on ties.
        scored.sort_by(|a, b| b.score.score.total_cmp(&a.score.score));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Recompute stored scores of pending applications. Returns how many changed.
    pub async fn rescore_pending(&self, job_id: Option<i64>) -> Result<usize> {
        let applications = ApplicationRepository::new(self.pool);
        let jobs = JobRepository::new(self.pool);
        let mut changed = 0;

        for application in applications.pending(job_id).await? {
            let Some(job) = jobs.find(application.job_id).await? else {
                continue;
            };
            let score = self.score_user(&job, application.applicant_id).await?;
            if score.score != application.match_score {
                applications
                    .set_match_score(application.id, score.score)
                    .await?;
                changed += 1;
            }
        }

        app_log!(info, "Rescored pending applications, {} changed", changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AuthProvider, Role};
    use crate::core::repositories::{
        AgentUpsert, IdentityUpsert, NewApplication, NewJob, ProfileUpdate, UserRepository,
    };
    use crate::core::Database;

    async fn user(db: &Database, id: &str, role: Role) -> i64 {
        UserRepository::new(db.pool())
            .upsert_identity(&IdentityUpsert {
                provider: AuthProvider::Moltbook,
                external_id: id,
                display_name: id,
                email: None,
                avatar_url: None,
                role,
            })
            .await
            .unwrap()
            .id
    }

    async fn agent(db: &Database, name: &str, karma: i64, skills: &[&str]) -> i64 {
        let id = user(db, name, Role::Agent).await;
        AgentRepository::new(db.pool())
            .upsert(
                id,
                &AgentUpsert {
                    moltbook_name: name,
                    description: None,
                    karma,
                    follower_count: 0,
                    owner_handle: None,
                },
            )
            .await
            .unwrap();
        ProfileRepository::new(db.pool())
            .upsert(
                id,
                &ProfileUpdate {
                    skills: skills.iter().map(|s| s.to_string()).collect(),
                    rate_min: Some(40.0),
                    rate_max: Some(80.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        id
    }

    async fn job(db: &Database, poster: i64, skills: &[&str]) -> Job {
        JobRepository::new(db.pool())
            .create(
                poster,
                &NewJob {
                    title: "Scraper".into(),
                    description: "Scrape things".into(),
                    skills: skills.iter().map(|s| s.to_string()).collect(),
                    budget_min: Some(50.0),
                    budget_max: Some(100.0),
                    location: None,
                    remote: true,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_score_user_uses_all_signals() {
        let db = Database::in_memory().await.unwrap();
        let poster = user(&db, "acme", Role::Company).await;
        let agent_id = agent(&db, "scrapey", 50, &["python", "web scraping"]).await;
        FollowRepository::new(db.pool()).follow(agent_id, poster).await.unwrap();
        let job = job(&db, poster, &["Python", "Scraping", "Go"]).await;

        let score = MatchService::new(db.pool()).score_user(&job, agent_id).await.unwrap();
        // 2 skills + overlap + 5 karma + follow
        assert_eq!(score.score, 20.0 + 20.0 + 5.0 + 15.0);
        assert!(score.rate_overlap);
        assert!(score.follows_poster);
    }

    #[tokio::test]
    async fn test_user_without_profile_scores_on_karma_only() {
        let db = Database::in_memory().await.unwrap();
        let poster = user(&db, "acme", Role::Company).await;
        let candidate = user(&db, "human", Role::Candidate).await;
        let job = job(&db, poster, &["Rust"]).await;

        let score = MatchService::new(db.pool()).score_user(&job, candidate).await.unwrap();
        assert_eq!(score.score, 0.0);
        assert!(score.matched_skills.is_empty());
    }

    #[tokio::test]
    async fn test_matches_for_job_ranks_agents() {
        let db = Database::in_memory().await.unwrap();
        let poster = user(&db, "acme", Role::Company).await;
        let weak = agent(&db, "weak", 0, &["cooking"]).await;
        let strong = agent(&db, "strong", 10, &["rust", "sql"]).await;
        let job = job(&db, poster, &["Rust", "SQL"]).await;

        let ranked = MatchService::new(db.pool()).matches_for_job(&job, 10).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.user_id, strong);
        assert_eq!(ranked[1].candidate.user_id, weak);

        let top = MatchService::new(db.pool()).matches_for_job(&job, 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_recommended_and_rescore() {
        let db = Database::in_memory().await.unwrap();
        let poster = user(&db, "acme", Role::Company).await;
        let agent_id = agent(&db, "rusty", 0, &["rust"]).await;
        let rust_job = job(&db, poster, &["Rust"]).await;
        let go_job = job(&db, poster, &["Go"]).await;

        let service = MatchService::new(db.pool());
        let recommended = service.recommended_jobs(agent_id, 10).await.unwrap();
        assert_eq!(recommended[0].job.job.id, rust_job.id);
        assert_eq!(recommended[1].job.job.id, go_job.id);

        let application = ApplicationRepository::new(db.pool())
            .create(&NewApplication {
                job_id: rust_job.id,
                applicant_id: agent_id,
                cover_letter: None,
                proposed_rate: None,
                match_score: 0.0,
            })
            .await
            .unwrap();

        assert_eq!(service.rescore_pending(None).await.unwrap(), 1);
        assert_eq!(service.rescore_pending(Some(rust_job.id)).await.unwrap(), 0);
        let stored = ApplicationRepository::new(db.pool())
            .find(application.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.match_score, 30.0);
    }
}
