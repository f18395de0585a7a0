// src/core/repositories/users.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::app_log;
use crate::core::models::{AuthProvider, Role, User};
use crate::pagination::PageParams;

/// Identity as reported by a sign-in provider.
#[derive(Debug, Clone)]
pub struct IdentityUpsert<'a> {
    pub provider: AuthProvider,
    pub external_id: &'a str,
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub role: Role,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(found)
    }

    /// Insert or refresh a user by provider identity. An existing user keeps its role.
    pub async fn upsert_identity(&self, identity: &IdentityUpsert<'_>) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        upsert_identity_on(&mut conn, identity).await
    }

    pub async fn list(&self, role: Option<Role>, params: &PageParams) -> Result<(Vec<User>, i64)> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE (?1 IS NULL OR role = ?1)
            ORDER BY id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(role)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE (?1 IS NULL OR role = ?1)")
            .bind(role)
            .fetch_one(self.pool)
            .await?;

        Ok((users, total))
    }

    pub async fn set_role(&self, id: i64, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            app_log!(info, "Set role of user {} to {}", id, role);
        }
        Ok(updated)
    }
}

pub(crate) async fn upsert_identity_on(
    conn: &mut SqliteConnection,
    identity: &IdentityUpsert<'_>,
) -> Result<User> {
    let now = Utc::now();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (auth_provider, external_id, display_name, email, avatar_url, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (auth_provider, external_id) DO UPDATE SET
            display_name = excluded.display_name,
            email = COALESCE(excluded.email, users.email),
            avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(identity.provider)
    .bind(identity.external_id)
    .bind(identity.display_name)
    .bind(identity.email)
    .bind(identity.avatar_url)
    .bind(identity.role)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    app_log!(
        info,
        "Upserted {} user {} ({:?})",
        user.role,
        user.id,
        identity.provider
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Database;

    fn identity<'a>(external_id: &'a str, name: &'a str, role: Role) -> IdentityUpsert<'a> {
        IdentityUpsert {
            provider: AuthProvider::Moltbook,
            external_id,
            display_name: name,
            email: None,
            avatar_url: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_identity() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let first = repo.upsert_identity(&identity("mb-1", "Clawd", Role::Agent)).await.unwrap();
        let again = repo
            .upsert_identity(&identity("mb-1", "Clawd Renamed", Role::Company))
            .await
            .unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.display_name, "Clawd Renamed");
        assert_eq!(again.role, Role::Agent);
        assert!(repo.exists(first.id).await.unwrap());
        assert!(!repo.exists(first.id + 100).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_role() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());
        repo.upsert_identity(&identity("a", "A", Role::Agent)).await.unwrap();
        repo.upsert_identity(&identity("b", "B", Role::Company)).await.unwrap();
        repo.upsert_identity(&identity("c", "C", Role::Agent)).await.unwrap();

        let (agents, total) = repo.list(Some(Role::Agent), &PageParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(agents.iter().all(|u| u.role == Role::Agent));

        let (_, all) = repo.list(None, &PageParams::default()).await.unwrap();
        assert_eq!(all, 3);
    }
}
