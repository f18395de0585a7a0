// src/core/repositories/follows.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::core::models::UserSummary;
use crate::pagination::PageParams;

pub struct FollowRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FollowRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns false when the follow already existed.
    pub async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.pool)
        .await?;
        Ok(found)
    }

    pub async fn followers(&self, user_id: i64, params: &PageParams) -> Result<(Vec<UserSummary>, i64)> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.display_name, u.avatar_url, u.role
            FROM follows f JOIN users u ON u.id = f.follower_id
            WHERE f.followee_id = ?
            ORDER BY f.created_at DESC, u.id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((users, self.counts(user_id).await?.0))
    }

    pub async fn following(&self, user_id: i64, params: &PageParams) -> Result<(Vec<UserSummary>, i64)> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.display_name, u.avatar_url, u.role
            FROM follows f JOIN users u ON u.id = f.followee_id
            WHERE f.follower_id = ?
            ORDER BY f.created_at DESC, u.id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((users, self.counts(user_id).await?.1))
    }

    /// `(followers, following)`
    pub async fn counts(&self, user_id: i64) -> Result<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AuthProvider, Role};
    use crate::core::repositories::{IdentityUpsert, UserRepository};
    use crate::core::Database;

    async fn user(db: &Database, id: &str) -> i64 {
        UserRepository::new(db.pool())
            .upsert_identity(&IdentityUpsert {
                provider: AuthProvider::Moltbook,
                external_id: id,
                display_name: id,
                email: None,
                avatar_url: None,
                role: Role::Agent,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        let repo = FollowRepository::new(db.pool());

        assert!(repo.follow(a, b).await.unwrap());
        assert!(!repo.follow(a, b).await.unwrap());
        assert!(repo.is_following(a, b).await.unwrap());
        assert!(!repo.is_following(b, a).await.unwrap());
        assert_eq!(repo.counts(b).await.unwrap(), (1, 0));

        let (followers, total) = repo.followers(b, &PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(followers[0].id, a);

        assert!(repo.unfollow(a, b).await.unwrap());
        assert!(!repo.unfollow(a, b).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_follow_violates_check() {
        let db = Database::in_memory().await.unwrap();
        let a = user(&db, "a").await;
        // INSERT OR IGNORE also swallows CHECK failures.
        assert!(!FollowRepository::new(db.pool()).follow(a, a).await.unwrap());
    }
}
