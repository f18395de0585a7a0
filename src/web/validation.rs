// src/web/validation.rs - request body checks shared by the handlers

use std::collections::HashSet;

use crate::error::{ApiError, ApiResult};

pub const MAX_SKILLS: usize = 50;
pub const MAX_SKILL_LEN: usize = 64;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_MESSAGE_LEN: usize = 5_000;
pub const MAX_SHORT_TEXT_LEN: usize = 500;

/// Trimmed, non-empty and at most `max` characters.
pub fn require_text(value: &str, field: &str, max: usize) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Like `require_text`, but blank input becomes `None`.
pub fn optional_text(value: Option<String>, field: &str, max: usize) -> ApiResult<Option<String>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => require_text(text, field, max).map(Some),
    }
}

/// Trim, drop blanks and de-duplicate case-insensitively, keeping first spelling and order.
pub fn normalize_skills(skills: Vec<String>) -> ApiResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();

    for skill in skills {
        let skill = skill.trim();
        if skill.is_empty() {
            continue;
        }
        if skill.chars().count() > MAX_SKILL_LEN {
            return Err(ApiError::bad_request(format!(
                "Skill '{}' is longer than {} characters",
                skill, MAX_SKILL_LEN
            )));
        }
        if seen.insert(skill.to_lowercase()) {
            normalized.push(skill.to_string());
        }
    }

    if normalized.len() > MAX_SKILLS {
        return Err(ApiError::bad_request(format!(
            "At most {} skills are allowed",
            MAX_SKILLS
        )));
    }
    Ok(normalized)
}

/// Rates and budgets: finite, non-negative and `min <= max` when both are set.
pub fn validate_range(min: Option<f64>, max: Option<f64>, field: &str) -> ApiResult<()> {
    for bound in [min, max].into_iter().flatten() {
        if !bound.is_finite() || bound < 0.0 {
            return Err(ApiError::bad_request(format!(
                "{} must be a non-negative number",
                field
            )));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ApiError::bad_request(format!(
                "{} minimum must not exceed maximum",
                field
            )));
        }
    }
    Ok(())
}

pub fn clamp_limit(limit: Option<usize>, default: usize, max: usize) -> usize {
    limit.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_are_trimmed_and_deduplicated() {
        let skills = normalize_skills(vec![
            " Rust ".into(),
            "rust".into(),
            "".into(),
            "SQL".into(),
            "   ".into(),
        ])
        .unwrap();
        assert_eq!(skills, vec!["Rust".to_string(), "SQL".to_string()]);
    }

    #[test]
    fn test_too_many_skills_rejected() {
        let skills = (0..=MAX_SKILLS).map(|i| format!("skill-{}", i)).collect();
        assert!(normalize_skills(skills).is_err());

        let skills = (0..MAX_SKILLS).map(|i| format!("skill-{}", i)).collect();
        assert_eq!(normalize_skills(skills).unwrap().len(), MAX_SKILLS);
    }

    #[test]
    fn test_range_rules() {
        assert!(validate_range(None, None, "Rate").is_ok());
        assert!(validate_range(Some(10.0), Some(10.0), "Rate").is_ok());
        assert!(validate_range(Some(50.0), None, "Rate").is_ok());
        assert!(validate_range(Some(50.0), Some(10.0), "Rate").is_err());
        assert!(validate_range(Some(-1.0), None, "Rate").is_err());
        assert!(validate_range(None, Some(f64::NAN), "Budget").is_err());
    }

    #[test]
    fn test_text_rules() {
        assert_eq!(require_text("  hi  ", "Title", 10).unwrap(), "hi");
        assert!(require_text("   ", "Title", 10).is_err());
        assert!(require_text("ééééé", "Title", 5).is_ok());
        assert!(require_text("abcdef", "Title", 5).is_err());

        assert_eq!(optional_text(Some("  ".into()), "Bio", 5).unwrap(), None);
        assert_eq!(optional_text(None, "Bio", 5).unwrap(), None);
        assert_eq!(
            optional_text(Some(" ok ".into()), "Bio", 5).unwrap(),
            Some("ok".to_string())
        );
    }

    #[test]
    fn test_limit_clamped() {
        assert_eq!(clamp_limit(None, 10, 50), 10);
        assert_eq!(clamp_limit(Some(0), 10, 50), 1);
        assert_eq!(clamp_limit(Some(500), 10, 50), 50);
    }
}
