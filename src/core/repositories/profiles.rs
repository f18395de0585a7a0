// src/core/repositories/profiles.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::core::models::{Availability, Profile, ProfileCard};
use crate::pagination::PageParams;

use super::{contains_pattern, LIKE_ESCAPE};

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub rate_min: Option<f64>,
    pub rate_max: Option<f64>,
    pub location: Option<String>,
    pub availability: Availability,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub skill: Option<String>,
    pub availability: Option<Availability>,
}

pub struct ProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i64) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn find_card(&self, user_id: i64) -> Result<Option<ProfileCard>> {
        let card = sqlx::query_as::<_, ProfileCard>(
            r#"
            SELECT p.*, u.display_name, u.avatar_url, u.role
            FROM profiles p JOIN users u ON u.id = p.user_id
            WHERE p.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(card)
    }

    pub async fn upsert(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, headline, bio, skills, rate_min, rate_max, location, availability, website, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                headline = excluded.headline,
                bio = excluded.bio,
                skills = excluded.skills,
                rate_min = excluded.rate_min,
                rate_max = excluded.rate_max,
                location = excluded.location,
                availability = excluded.availability,
                website = excluded.website,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&update.headline)
        .bind(&update.bio)
        .bind(Json(&update.skills))
        .bind(update.rate_min)
        .bind(update.rate_max)
        .bind(&update.location)
        .bind(update.availability)
        .bind(&update.website)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn list(
        &self,
        filter: &ProfileFilter,
        params: &PageParams,
    ) -> Result<(Vec<ProfileCard>, i64)> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT p.*, u.display_name, u.avatar_url, u.role \
             FROM profiles p JOIN users u ON u.id = p.user_id WHERE 1 = 1",
        );
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY p.updated_at DESC, p.user_id ASC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let cards = query
            .build_query_as::<ProfileCard>()
            .fetch_all(self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM profiles p JOIN users u ON u.id = p.user_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        Ok((cards, total))
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProfileFilter) {
    if let Some(skill) = filter.skill.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND p.skills LIKE ")
            .push_bind(contains_pattern(skill))
            .push(LIKE_ESCAPE);
    }
    if let Some(availability) = filter.availability {
        query.push(" AND p.availability = ").push_bind(availability);
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
                provider: AuthProvider::Firebase,
                external_id: id,
                display_name: id,
                email: None,
                avatar_url: None,
                role: Role::Candidate,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_upsert_then_filter_by_skill() {
        let db = Database::in_memory().await.unwrap();
        let repo = ProfileRepository::new(db.pool());
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;

        repo.upsert(
            alice,
            &ProfileUpdate {
                skills: vec!["Rust".into(), "SQL".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        repo.upsert(
            bob,
            &ProfileUpdate {
                skills: vec!["Python".into()],
                availability: Availability::Busy,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let filter = ProfileFilter {
            skill: Some("rust".into()),
            availability: None,
        };
        let (cards, total) = repo.list(&filter, &PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(cards[0].profile.user_id, alice);
        assert_eq!(cards[0].profile.skills, vec!["Rust", "SQL"]);

        let filter = ProfileFilter {
            skill: None,
            availability: Some(Availability::Busy),
        };
        let (cards, _) = repo.list(&filter, &PageParams::default()).await.unwrap();
        assert_eq!(cards[0].display_name, "bob");
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let db = Database::in_memory().await.unwrap();
        let repo = ProfileRepository::new(db.pool());
        let id = user(&db, "carol").await;

        repo.upsert(id, &ProfileUpdate { headline: Some("v1".into()), ..Default::default() })
            .await
            .unwrap();
        let updated = repo
            .upsert(id, &ProfileUpdate { headline: Some("v2".into()), rate_min: Some(40.0), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(updated.headline.as_deref(), Some("v2"));
        assert_eq!(updated.rate().min, Some(40.0));
        assert!(repo.find(id).await.unwrap().is_some());
    }
}
