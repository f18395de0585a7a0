// src/core/repositories/jobs.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app_log;
use crate::core::models::{Job, JobForViewer, JobStatus};
use crate::pagination::PageParams;

use super::{contains_pattern, LIKE_ESCAPE};

/// Upper bound on open jobs considered when ranking recommendations.
const RECOMMENDATION_POOL: i64 = 500;

#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub location: Option<String>,
    pub remote: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub budget_min: Option<Option<f64>>,
    pub budget_max: Option<Option<f64>>,
    pub location: Option<Option<String>>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
}

impl JobUpdate {
    pub fn apply_to(self, job: &mut Job) {
        if let Some(title) = self.title {
            job.title = title;
        }
        if let Some(description) = self.description {
            job.description = description;
        }
        if let Some(skills) = self.skills {
            job.skills = skills;
        }
        if let Some(budget_min) = self.budget_min {
            job.budget_min = budget_min;
        }
        if let Some(budget_max) = self.budget_max {
            job.budget_max = budget_max;
        }
        if let Some(location) = self.location {
            job.location = location;
        }
        if let Some(remote) = self.remote {
            job.remote = remote;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub skill: Option<String>,
    pub query: Option<String>,
    pub poster_id: Option<i64>,
}

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, poster_id: i64, job: &NewJob) -> Result<Job> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (poster_id, title, description, skills, budget_min, budget_max, location, remote, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'open', ?, ?)
            RETURNING *
            "#,
        )
        .bind(poster_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(Json(&job.skills))
        .bind(job.budget_min)
        .bind(job.budget_max)
        .bind(&job.location)
        .bind(job.remote)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        app_log!(
            info,
            "Job {} '{}' created by user {}",
            created.id,
            created.title,
            poster_id
        );
        Ok(created)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(job)
    }

    /// Newest first.
    pub async fn list(&self, filter: &JobFilter, params: &PageParams) -> Result<(Vec<Job>, i64)> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs WHERE 1 = 1");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let jobs = query.build_query_as::<Job>().fetch_all(self.pool).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        Ok((jobs, total))
    }

    /// Write every mutable column of `job` back.
    pub async fn save(&self, job: &Job) -> Result<Job> {
        let saved = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                title = ?, description = ?, skills = ?, budget_min = ?, budget_max = ?,
                location = ?, remote = ?, status = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&job.title)
        .bind(&job.description)
        .bind(Json(&job.skills))
        .bind(job.budget_min)
        .bind(job.budget_max)
        .bind(&job.location)
        .bind(job.remote)
        .bind(job.status)
        .bind(Utc::now())
        .bind(job.id)
        .fetch_one(self.pool)
        .await?;
        Ok(saved)
    }

    pub async fn set_status(&self, id: i64, status: JobStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            app_log!(info, "Deleted job {}", id);
        }
        Ok(deleted)
    }

    /// Open jobs not posted by `viewer_id`, newest first, with the viewer's follow flag.
    pub async fn open_for_viewer(&self, viewer_id: i64) -> Result<Vec<JobForViewer>> {
        let jobs = sqlx::query_as::<_, JobForViewer>(
            r#"
            SELECT j.*,
                   EXISTS(
                       SELECT 1 FROM follows f
                       WHERE f.follower_id = ?1 AND f.followee_id = j.poster_id
                   ) AS viewer_follows_poster
            FROM jobs j
            WHERE j.status = 'open' AND j.poster_id <> ?1
            ORDER BY j.created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(viewer_id)
        .bind(RECOMMENDATION_POOL)
        .fetch_all(self.pool)
        .await?;
        Ok(jobs)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &JobFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(skill) = filter.skill.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND skills LIKE ")
            .push_bind(contains_pattern(skill))
            .push(LIKE_ESCAPE);
    }
    if let Some(q) = filter.query.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(q);
        query
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }
    if let Some(poster_id) = filter.poster_id {
        query.push(" AND poster_id = ").push_bind(poster_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AuthProvider, Role};
    use crate::core::repositories::{IdentityUpsert, UserRepository};
    use crate::core::Database;

    async fn poster(db: &Database) -> i64 {
        UserRepository::new(db.pool())
            .upsert_identity(&IdentityUpsert {
                provider: AuthProvider::Firebase,
                external_id: "acme",
                display_name: "Acme",
                email: Some("jobs@acme.test"),
                avatar_url: None,
                role: Role::Company,
            })
            .await
            .unwrap()
            .id
    }

    fn new_job(title: &str, skills: &[&str]) -> NewJob {
        NewJob {
            title: title.to_string(),
            description: "Build things".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            budget_min: Some(50.0),
            budget_max: Some(120.0),
            location: None,
            remote: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_filter() {
        let db = Database::in_memory().await.unwrap();
        let repo = JobRepository::new(db.pool());
        let poster_id = poster(&db).await;

        let rust = repo.create(poster_id, &new_job("Rust backend", &["Rust", "SQL"])).await.unwrap();
        let ml = repo.create(poster_id, &new_job("ML pipeline", &["Python"])).await.unwrap();
        repo.set_status(ml.id, JobStatus::Closed).await.unwrap();

        let filter = JobFilter {
            status: Some(JobStatus::Open),
            ..Default::default()
        };
        let (open, total) = repo.list(&filter, &PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(open[0].id, rust.id);
        assert_eq!(open[0].skills, vec!["Rust", "SQL"]);

        let filter = JobFilter {
            skill: Some("python".into()),
            ..Default::default()
        };
        let (found, _) = repo.list(&filter, &PageParams::default()).await.unwrap();
        assert_eq!(found[0].id, ml.id);

        let filter = JobFilter {
            query: Some("backend".into()),
            poster_id: Some(poster_id),
            ..Default::default()
        };
        let (found, total) = repo.list(&filter, &PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].title, "Rust backend");
    }

    #[tokio::test]
    async fn test_wildcards_in_filters_match_literally() {
        let db = Database::in_memory().await.unwrap();
        let repo = JobRepository::new(db.pool());
        let poster_id = poster(&db).await;
        repo.create(poster_id, &new_job("Rust backend", &["Rust"])).await.unwrap();
        let discount = repo.create(poster_id, &new_job("50% off crawler", &["C_lang", "QA 100%"])).await.unwrap();

        for (skill, query) in [(Some("%"), None), (Some("_"), None), (None, Some("%"))] {
            let filter = JobFilter {
                skill: skill.map(String::from),
                query: query.map(String::from),
                ..Default::default()
            };
            let (found, total) = repo.list(&filter, &PageParams::default()).await.unwrap();
            assert_eq!(total, 1, "skill={:?} query={:?}", skill, query);
            assert_eq!(found[0].id, discount.id);
        }
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = Database::in_memory().await.unwrap();
        let repo = JobRepository::new(db.pool());
        let poster_id = poster(&db).await;
        let mut job = repo.create(poster_id, &new_job("Old", &["Go"])).await.unwrap();

        JobUpdate {
            title: Some("New".into()),
            budget_max: Some(None),
            ..Default::default()
        }
        .apply_to(&mut job);
        let saved = repo.save(&job).await.unwrap();

        assert_eq!(saved.title, "New");
        assert_eq!(saved.budget_min, Some(50.0));
        assert_eq!(saved.budget_max, None);
        assert_eq!(saved.skills, vec!["Go"]);

        assert!(repo.delete(saved.id).await.unwrap());
        assert!(repo.find(saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_for_viewer_excludes_own_jobs() {
        let db = Database::in_memory().await.unwrap();
        let repo = JobRepository::new(db.pool());
        let poster_id = poster(&db).await;
        repo.create(poster_id, &new_job("Mine", &[])).await.unwrap();

        assert!(repo.open_for_viewer(poster_id).await.unwrap().is_empty());
        assert_eq!(repo.open_for_viewer(poster_id + 1).await.unwrap().len(), 1);
    }
}
