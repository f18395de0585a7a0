// src/core/repositories/agents.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::app_log;
use crate::core::models::{Agent, AgentMatchRow, AgentSummary, User};
use crate::core::repositories::contains_pattern;
use crate::core::repositories::users::{upsert_identity_on, IdentityUpsert};
use crate::pagination::PageParams;

#[derive(Debug, Clone)]
pub struct AgentUpsert<'a> {
    pub moltbook_name: &'a str,
    pub description: Option<&'a str>,
    pub karma: i64,
    pub follower_count: i64,
    pub owner_handle: Option<&'a str>,
}

pub struct AgentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AgentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the latest verified Moltbook snapshot for an agent user.
    pub async fn upsert(&self, user_id: i64, agent: &AgentUpsert<'_>) -> Result<Agent> {
        let mut conn = self.pool.acquire().await?;
        upsert_agent_on(&mut conn, user_id, agent).await
    }

    /// Upsert the user and its agent row together. Neither is written if either fails.
    pub async fn record_sign_in(
        &self,
        identity: &IdentityUpsert<'_>,
        agent: &AgentUpsert<'_>,
    ) -> Result<(User, Agent)> {
        let mut tx = self.pool.begin().await?;
        let user = upsert_identity_on(&mut tx, identity).await?;
        let row = upsert_agent_on(&mut tx, user.id, agent).await?;
        tx.commit().await?;
        Ok((user, row))
    }

    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(agent)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE moltbook_name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(agent)
    }

    pub async fn karma_of(&self, user_id: i64) -> Result<i64> {
        let karma: Option<i64> = sqlx::query_scalar("SELECT karma FROM agents WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(karma.unwrap_or(0))
    }

    /// Browse agents, highest karma first. `query` matches name or description.
    pub async fn list(
        &self,
        query: Option<&str>,
        params: &PageParams,
    ) -> Result<(Vec<AgentSummary>, i64)> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(contains_pattern);

        let agents = sqlx::query_as::<_, AgentSummary>(
            r#"
            SELECT a.user_id, a.moltbook_name, a.description, a.karma, a.follower_count,
                   u.display_name, u.avatar_url, p.headline
            FROM agents a
            JOIN users u ON u.id = a.user_id
            LEFT JOIN profiles p ON p.user_id = a.user_id
            WHERE (?1 IS NULL OR a.moltbook_name LIKE ?1 ESCAPE '\' OR a.description LIKE ?1 ESCAPE '\')
            ORDER BY a.karma DESC, a.user_id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM agents a
            WHERE (?1 IS NULL OR a.moltbook_name LIKE ?1 ESCAPE '\' OR a.description LIKE ?1 ESCAPE '\')
            "#,
        )
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;

        Ok((agents, total))
    }

    /// All agents with a profile, annotated with whether they follow `poster_id`.
    pub async fn match_candidates(&self, poster_id: i64) -> Result<Vec<AgentMatchRow>> {
        let rows = sqlx::query_as::<_, AgentMatchRow>(
            r#"
            SELECT a.user_id, a.moltbook_name, u.display_name, u.avatar_url, a.karma,
                   p.headline, p.availability, p.skills, p.rate_min, p.rate_max,
                   EXISTS(
                       SELECT 1 FROM follows f
                       WHERE f.follower_id = a.user_id AND f.followee_id = ?1
                   ) AS follows_poster
            FROM agents a
            JOIN users u ON u.id = a.user_id
            JOIN profiles p ON p.user_id = a.user_id
            WHERE a.user_id <> ?1 AND p.availability <> 'unavailable'
            "#,
        )
        .bind(poster_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

async fn upsert_agent_on(
    conn: &mut SqliteConnection,
    user_id: i64,
    agent: &AgentUpsert<'_>,
) -> Result<Agent> {
    let row = sqlx::query_as::<_, Agent>(
        r#"
        INSERT INTO agents (user_id, moltbook_name, description, karma, follower_count, owner_handle, verified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            moltbook_name = excluded.moltbook_name,
            description = excluded.description,
            karma = excluded.karma,
            follower_count = excluded.follower_count,
            owner_handle = excluded.owner_handle,
            verified_at = excluded.verified_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(agent.moltbook_name)
    .bind(agent.description)
    .bind(agent.karma)
    .bind(agent.follower_count)
    .bind(agent.owner_handle)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    app_log!(
        info,
        "Agent {} verified with karma {}",
        row.moltbook_name,
        row.karma
    );
    Ok(row)
}
