// src/core/repositories/applications.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::app_log;
use crate::core::models::{Application, ApplicationStatus, ApplicationView, JobStatus};
use crate::pagination::PageParams;

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: i64,
    pub applicant_id: i64,
    pub cover_letter: Option<String>,
    pub proposed_rate: Option<f64>,
    pub match_score: f64,
}

const VIEW_SELECT: &str = r#"
    SELECT a.*, j.title AS job_title, u.display_name AS applicant_name
    FROM applications a
    JOIN jobs j ON j.id = a.job_id
    JOIN users u ON u.id = a.applicant_id
"#;

pub struct ApplicationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, application: &NewApplication) -> Result<Application> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (job_id, applicant_id, cover_letter, proposed_rate, match_score, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING *
            "#,
        )
        .bind(application.job_id)
        .bind(application.applicant_id)
        .bind(&application.cover_letter)
        .bind(application.proposed_rate)
        .bind(application.match_score)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        app_log!(
            info,
            "User {} applied to job {} (score {})",
            created.applicant_id,
            created.job_id,
            created.match_score
        );
        Ok(created)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Application>> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(application)
    }

    pub async fn exists_for(&self, job_id: i64, applicant_id: i64) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE job_id = ? AND applicant_id = ?)",
        )
        .bind(job_id)
        .bind(applicant_id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    /// Applications to one job, best match first.
    pub async fn list_for_job(
        &self,
        job_id: i64,
        status: Option<ApplicationStatus>,
        params: &PageParams,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        let sql = format!(
            "{} WHERE a.job_id = ?1 AND (?2 IS NULL OR a.status = ?2) \
             ORDER BY a.match_score DESC, a.created_at ASC LIMIT ?3 OFFSET ?4",
            VIEW_SELECT
        );
        let items = sqlx::query_as::<_, ApplicationView>(&sql)
            .bind(job_id)
            .bind(status)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE job_id = ?1 AND (?2 IS NULL OR status = ?2)",
        )
        .bind(job_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((items, total))
    }

    /// Applications made by one user, newest first.
    pub async fn list_for_applicant(
        &self,
        applicant_id: i64,
        status: Option<ApplicationStatus>,
        params: &PageParams,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        let sql = format!(
            "{} WHERE a.applicant_id = ?1 AND (?2 IS NULL OR a.status = ?2) \
             ORDER BY a.created_at DESC, a.id DESC LIMIT ?3 OFFSET ?4",
            VIEW_SELECT
        );
        let items = sqlx::query_as::<_, ApplicationView>(&sql)
            .bind(applicant_id)
            .bind(status)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE applicant_id = ?1 AND (?2 IS NULL OR status = ?2)",
        )
        .bind(applicant_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((items, total))
    }

    /// Move a pending application to `status`. `None` when it is no longer pending.
    pub async fn set_status(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<Option<Application>> {
        let updated = sqlx::query_as::<_, Application>(
            "UPDATE applications SET status = ?, updated_at = ? \
             WHERE id = ? AND status = 'pending' RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .with_context(|| format!("Failed to update application {}", id))?;
        Ok(updated)
    }

    /// Accept a pending application and mark its job filled in one transaction.
    pub async fn accept_and_fill(&self, id: i64, job_id: i64) -> Result<Option<Application>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let accepted = sqlx::query_as::<_, Application>(
            "UPDATE applications SET status = 'accepted', updated_at = ? \
             WHERE id = ? AND status = 'pending' RETURNING *",
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(accepted) = accepted else {
            return Ok(None);
        };

        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(JobStatus::Filled)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        app_log!(info, "Application {} accepted, job {} filled", id, job_id);
        Ok(Some(accepted))
    }

    pub async fn pending(&self, job_id: Option<i64>) -> Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE status = 'pending' AND (?1 IS NULL OR job_id = ?1) ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_match_score(&self, id: i64, score: f64) -> Result<()> {
        sqlx::query("UPDATE applications SET match_score = ? WHERE id = ?")
            .bind(score)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
