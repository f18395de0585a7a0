// src/web/handlers/profile_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::auth::AuthenticatedUser;
use crate::core::models::{Availability, Profile, ProfileCard};
use crate::core::repositories::{ProfileFilter, ProfileRepository, ProfileUpdate};
use crate::core::Database;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::web::types::{DataResponse, ProfileRequest};
use crate::web::validation::{
    normalize_skills, optional_text, validate_range, MAX_DESCRIPTION_LEN, MAX_SHORT_TEXT_LEN,
};

impl ProfileRequest {
    /// Validate and normalize into a storable update.
    pub fn into_update(self) -> ApiResult<ProfileUpdate> {
        validate_range(self.rate_min, self.rate_max, "Rate")?;

        Ok(ProfileUpdate {
            headline: optional_text(self.headline, "Headline", MAX_SHORT_TEXT_LEN)?,
            bio: optional_text(self.bio, "Bio", MAX_DESCRIPTION_LEN)?,
            skills: normalize_skills(self.skills)?,
            rate_min: self.rate_min,
            rate_max: self.rate_max,
            location: optional_text(self.location, "Location", MAX_SHORT_TEXT_LEN)?,
            availability: self.availability.unwrap_or_default(),
            website: optional_text(self.website, "Website", MAX_SHORT_TEXT_LEN)?,
        })
    }
}

pub async fn list_profiles_handler(
    skill: Option<String>,
    availability: Option<Availability>,
    params: PageParams,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Page<ProfileCard>>>> {
    let filter = ProfileFilter {
        skill,
        availability,
    };
    let (cards, total) = ProfileRepository::new(db.pool())
        .list(&filter, &params)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} profiles", total),
        Page::new(cards, &params, total),
    )))
}

pub async fn get_profile_handler(
    user_id: i64,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<ProfileCard>>> {
    let card = ProfileRepository::new(db.pool())
        .find_card(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;

    Ok(Json(DataResponse::success("Profile", card)))
}

pub async fn update_my_profile_handler(
    request: Json<ProfileRequest>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<Json<DataResponse<Profile>>> {
    let update = request.into_inner().into_update()?;
    let profile = ProfileRepository::new(db.pool())
        .upsert(auth.id(), &update)
        .await?;

    app_log!(
        info,
        "User {} updated profile ({} skills)",
        auth.id(),
        profile.skills.len()
    );

    Ok(Json(DataResponse::success("Profile saved", profile)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_request_normalized() {
        let request = ProfileRequest {
            headline: Some("  Rust agent ".into()),
            bio: Some("   ".into()),
            skills: vec!["rust".into(), "Rust".into(), " tokio ".into()],
            rate_min: Some(20.0),
            rate_max: Some(80.0),
            ..Default::default()
        };

        let update = request.into_update().unwrap();
        assert_eq!(update.headline.as_deref(), Some("Rust agent"));
        assert_eq!(update.bio, None);
        assert_eq!(update.skills, vec!["rust".to_string(), "tokio".to_string()]);
        assert_eq!(update.availability, Availability::Available);
    }

    #[test]
    fn test_inverted_rate_rejected() {
        let request = ProfileRequest {
            rate_min: Some(90.0),
            rate_max: Some(10.0),
            ..Default::default()
        };
        assert!(matches!(
            request.into_update(),
            Err(ApiError::BadRequest(_))
        ));
    }
}
