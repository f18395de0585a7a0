// src/matching.rs
//! Job to candidate compatibility scoring.
//!
//! A score is built from four signals: skill overlap, rate/budget overlap,
//! Moltbook karma and whether the candidate follows the job poster. The sum
//! is clamped into `0..=100` and rounded to one decimal.

use serde::{Deserialize, Serialize};

pub const SKILL_POINTS: f64 = 10.0;
pub const RATE_OVERLAP_POINTS: f64 = 20.0;
pub const KARMA_WEIGHT: f64 = 0.1;
pub const FOLLOW_POINTS: f64 = 15.0;
pub const MAX_SCORE: f64 = 100.0;

/// Hourly rate or budget range. Either bound may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RateRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_known(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Missing lower bound counts as 0, missing upper bound as unbounded.
    pub fn overlaps(&self, other: &RateRange) -> bool {
        if !self.is_known() || !other.is_known() {
            return false;
        }
        let (a_min, a_max) = self.bounds();
        let (b_min, b_max) = other.bounds();
        a_min <= b_max && b_min <= a_max
    }

    fn bounds(&self) -> (f64, f64) {
        (self.min.unwrap_or(0.0), self.max.unwrap_or(f64::INFINITY))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JobCriteria<'a> {
    pub skills: &'a [String],
    pub budget: RateRange,
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateCriteria<'a> {
    pub id: i64,
    pub skills: &'a [String],
    pub rate: RateRange,
    pub karma: i64,
    pub follows_poster: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub score: f64,
    pub matched_skills: Vec<String>,
    pub rate_overlap: bool,
    pub karma_bonus: f64,
    pub follows_poster: bool,
}

/// Anything that can be ranked against a job.
pub trait MatchCandidate {
    fn criteria(&self) -> CandidateCriteria<'_>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub candidate: T,
    #[serde(rename = "match")]
    pub score: MatchScore,
}

pub fn skills_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

pub fn score_match(job: &JobCriteria<'_>, candidate: &CandidateCriteria<'_>) -> MatchScore {
    let mut seen: Vec<String> = Vec::new();
    let mut matched_skills = Vec::new();

    for skill in job.skills {
        let key = skill.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        if candidate.skills.iter().any(|c| skills_match(skill, c)) {
            matched_skills.push(skill.trim().to_string());
        }
    }

    let rate_overlap = job.budget.overlaps(&candidate.rate);
    let karma_bonus = round1(candidate.karma as f64 * KARMA_WEIGHT);

    let mut total = matched_skills.len() as f64 * SKILL_POINTS + karma_bonus;
    if rate_overlap {
        total += RATE_OVERLAP_POINTS;
    }
    if candidate.follows_poster {
        total += FOLLOW_POINTS;
    }

    MatchScore {
        score: round1(total.clamp(0.0, MAX_SCORE)),
        matched_skills,
        rate_overlap,
        karma_bonus,
        follows_poster: candidate.follows_poster,
    }
}

/// Score every candidate and sort best first. Ties go to higher karma, then lower id.
pub fn rank_candidates<T: MatchCandidate>(job: &JobCriteria<'_>, candidates: Vec<T>) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score_match(job, &candidate.criteria());
            Ranked { candidate, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        let (ca, cb) = (a.candidate.criteria(), b.candidate.criteria());
        b.score
            .score
            .total_cmp(&a.score.score)
            .then_with(|| cb.karma.cmp(&ca.karma))
            .then_with(|| ca.id.cmp(&cb.id))
    });
    ranked
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn candidate<'a>(skills: &'a [String]) -> CandidateCriteria<'a> {
        CandidateCriteria {
            id: 1,
            skills,
            rate: RateRange::default(),
            karma: 0,
            follows_poster: false,
        }
    }

    #[test]
    fn test_fuzzy_skill_match_both_directions() {
        assert!(skills_match("Rust", "rust-async"));
        assert!(skills_match("machine learning", "Learning"));
        assert!(!skills_match("python", "rust"));
        assert!(!skills_match("  ", "rust"));
    }

    #[test]
    fn test_ten_points_per_matched_job_skill() {
        let job_skills = skills(&["Rust", "SQL", "Kubernetes"]);
        let agent_skills = skills(&["rust", "postgresql"]);
        let job = JobCriteria { skills: &job_skills, budget: RateRange::default() };

        let score = score_match(&job, &candidate(&agent_skills));
        assert_eq!(score.matched_skills, vec!["Rust", "SQL"]);
        assert_eq!(score.score, 20.0);
    }

    #[test]
    fn test_duplicate_job_skills_count_once() {
        let job_skills = skills(&["rust", "Rust ", "RUST"]);
        let agent_skills = skills(&["rust"]);
        let job = JobCriteria { skills: &job_skills, budget: RateRange::default() };

        assert_eq!(score_match(&job, &candidate(&agent_skills)).score, 10.0);
    }

    #[test]
    fn test_rate_overlap_adds_twenty() {
        let job = JobCriteria {
            skills: &[],
            budget: RateRange::new(Some(50.0), Some(100.0)),
        };
        let mut c = candidate(&[]);
        c.rate = RateRange::new(Some(90.0), Some(150.0));
        let score = score_match(&job, &c);
        assert!(score.rate_overlap);
        assert_eq!(score.score, 20.0);

        c.rate = RateRange::new(Some(120.0), None);
        assert!(!score_match(&job, &c).rate_overlap);
    }

    #[test]
    fn test_unknown_ranges_never_overlap() {
        let known = RateRange::new(Some(10.0), Some(20.0));
        assert!(!known.overlaps(&RateRange::default()));
        assert!(!RateRange::default().overlaps(&RateRange::default()));
        assert!(RateRange::new(None, Some(15.0)).overlaps(&known));
    }

    #[test]
    fn test_karma_and_follow_bonus() {
        let job = JobCriteria { skills: &[], budget: RateRange::default() };
        let mut c = candidate(&[]);
        c.karma = 123;
        c.follows_poster = true;

        let score = score_match(&job, &c);
        assert_eq!(score.karma_bonus, 12.3);
        assert_eq!(score.score, 27.3);
    }

    #[test]
    fn test_score_clamped_to_range() {
        let job_skills = skills(&["a1", "b2", "c3", "d4", "e5", "f6", "g7", "h8"]);
        let job = JobCriteria {
            skills: &job_skills,
            budget: RateRange::new(Some(1.0), Some(2.0)),
        };
        let mut c = candidate(&job_skills);
        c.rate = RateRange::new(Some(1.0), Some(2.0));
        c.karma = 5000;
        c.follows_poster = true;
        assert_eq!(score_match(&job, &c).score, MAX_SCORE);

        let mut negative = candidate(&[]);
        negative.karma = -400;
        assert_eq!(score_match(&job, &negative).score, 0.0);
    }

    struct Agent {
        id: i64,
        skills: Vec<String>,
        karma: i64,
    }

    impl MatchCandidate for Agent {
        fn criteria(&self) -> CandidateCriteria<'_> {
            CandidateCriteria {
                id: self.id,
                skills: &self.skills,
                rate: RateRange::default(),
                karma: self.karma,
                follows_poster: false,
            }
        }
    }

    #[test]
    fn test_rank_orders_by_score_then_karma_then_id() {
        let job_skills = skills(&["rust", "go"]);
        let job = JobCriteria { skills: &job_skills, budget: RateRange::default() };
        let agents = vec![
            Agent { id: 3, skills: skills(&["rust"]), karma: 0 },
            Agent { id: 1, skills: skills(&["rust", "golang"]), karma: 0 },
            Agent { id: 2, skills: skills(&["rust"]), karma: 0 },
            Agent { id: 4, skills: skills(&["python"]), karma: 100 },
        ];

        let ranked = rank_candidates(&job, agents);
        let ids: Vec<i64> = ranked.iter().map(|r| r.candidate.id).collect();
        // id 4 scores 10.0 via karma and ties with 2 and 3 but has more karma.
        assert_eq!(ids, vec![1, 4, 2, 3]);
    }
}
