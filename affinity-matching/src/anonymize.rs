//! Pre-consent view policy. What may be shown before mutual acceptance is
//! decided here; how it is rendered belongs to the messaging collaborator.
//! Full identity is only ever attached to a reveal notification.

use serde::Serialize;

use crate::models::{Profile, MAX_AGE, MIN_AGE};
use crate::tags::{self, SynonymTable};

const AGE_BAND_HALF_WIDTH: i32 = 3;
const DESCRIPTION_PREVIEW_LEN: usize = 150;
const TOP_INTERESTS: usize = 5;

/// Age-banded, truncated candidate view shown before mutual consent.
/// Deliberately excludes `user_id` and `display_name`.
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePreview {
    /// Inclusive band, e.g. (19, 25), clamped to the platform age band so
    /// the true age is never recoverable from the edges.
    pub age_band: (i32, i32),
    pub pronouns: String,
    /// Top canonical interests in the order the user entered them,
    /// at most [`TOP_INTERESTS`].
    pub interests: Vec<String>,
    /// How many more interests exist beyond the preview.
    pub hidden_interest_count: usize,
    pub description: String,
    /// Compatibility score at preview time.
    pub score: f64,
}

pub fn preview(profile: &Profile, score: f64, synonyms: &SynonymTable) -> CandidatePreview {
    let age_band = age_band(profile.age);
    let interests = top_interests(profile, synonyms);
    let hidden_interest_count = profile.interests.len().saturating_sub(interests.len());

    CandidatePreview {
        age_band,
        pronouns: profile.pronouns.clone(),
        interests,
        hidden_interest_count,
        description: truncate(&profile.description, DESCRIPTION_PREVIEW_LEN),
        score,
    }
}

/// Canonical tags in the order the raw entries were given. Canonical tags
/// with no surviving raw entry fill the remaining slots in set order.
fn top_interests(profile: &Profile, synonyms: &SynonymTable) -> Vec<String> {
    let mut interests: Vec<String> = Vec::with_capacity(TOP_INTERESTS);
    for raw in &profile.raw_interests {
        if interests.len() == TOP_INTERESTS {
            break;
        }
        let normalized = tags::normalize(raw);
        let tag = synonyms.fold(&normalized);
        if profile.interests.contains(tag) && !interests.iter().any(|t| t == tag) {
            interests.push(tag.to_string());
        }
    }
    for tag in &profile.interests {
        if interests.len() == TOP_INTERESTS {
            break;
        }
        if !interests.iter().any(|t| t == tag) {
            interests.push(tag.clone());
        }
    }
    interests
}

fn age_band(age: i32) -> (i32, i32) {
    (
        (age - AGE_BAND_HALF_WIDTH).max(MIN_AGE),
        (age + AGE_BAND_HALF_WIDTH).min(MAX_AGE),
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}
