use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::MatchingConfig;
use crate::fuzzy;
use crate::idf::TagWeights;
use crate::models::{Profile, MAX_AGE, MIN_AGE};

/// Outcome of the hard safety gate. Anything but `Eligible` short-circuits
/// the pair to a zero score and exclusion from ranked output; it is never
/// merely down-weighted, and never surfaced as a per-candidate reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    MinorAdultMix,
    AgeGapExceeded,
    OutsideAgeBand,
}

pub fn eligibility(a: &Profile, b: &Profile, config: &MatchingConfig) -> Eligibility {
    if a.is_minor() != b.is_minor() {
        return Eligibility::MinorAdultMix;
    }
    if (a.age - b.age).abs() > config.max_age_gap {
        return Eligibility::AgeGapExceeded;
    }
    if !(MIN_AGE..=MAX_AGE).contains(&a.age) || !(MIN_AGE..=MAX_AGE).contains(&b.age) {
        return Eligibility::OutsideAgeBand;
    }
    Eligibility::Eligible
}

/// Weighted Jaccard over canonical tags with a discounted fuzzy bonus.
///
/// When the weighted union is empty (both sets empty) the configured
/// `sparse_floor` applies; this is the single documented policy, there is
/// no alternative averaging.
pub fn interest_score(
    set_a: &BTreeSet<String>,
    set_b: &BTreeSet<String>,
    weights: &TagWeights,
    config: &MatchingConfig,
) -> f64 {
    let union: BTreeSet<&str> = set_a.union(set_b).map(String::as_str).collect();
    let weighted_union: f64 = union.iter().map(|t| weights.weight(t)).sum();
    if weighted_union <= 0.0 {
        return config.sparse_floor;
    }

    let exact: BTreeSet<String> = set_a.intersection(set_b).cloned().collect();
    let mut weighted_intersection: f64 = exact.iter().map(|t| weights.weight(t)).sum();

    let remaining_a: BTreeSet<String> = set_a.difference(&exact).cloned().collect();
    let remaining_b: BTreeSet<String> = set_b.difference(&exact).cloned().collect();

    for pair in fuzzy::best_fuzzy_matches(&remaining_a, &remaining_b, config.fuzzy_threshold) {
        let avg_weight = (weights.weight(&pair.tag_a) + weights.weight(&pair.tag_b)) / 2.0;
        weighted_intersection += avg_weight * pair.score * config.fuzzy_discount;
    }

    (weighted_intersection / weighted_union).clamp(0.0, 1.0)
}

/// Gaussian age affinity: 1.0 at zero gap, decaying with `sigma`.
pub fn age_score(age_a: i32, age_b: i32, sigma: f64) -> f64 {
    let diff = (age_a - age_b) as f64;
    (-(diff * diff) / (2.0 * sigma * sigma)).exp()
}

/// Cosine similarity of two personality vectors; 0.0 when either vector is
/// absent, zero-norm, or the lengths disagree. Never divides by zero.
pub fn personality_score(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Per-component breakdown of a pair score, on the [0, 1] scale.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub interests: f64,
    pub age: f64,
    pub personality: f64,
    pub total: f64,
}

/// Scores an eligible pair; `None` when the safety gate excludes it.
pub fn score_pair(
    a: &Profile,
    b: &Profile,
    weights: &TagWeights,
    config: &MatchingConfig,
) -> Option<ScoreBreakdown> {
    if eligibility(a, b, config) != Eligibility::Eligible {
        return None;
    }

    let interests = interest_score(&a.interests, &b.interests, weights, config);
    let age = age_score(a.age, b.age, config.age_sigma);
    let personality = if a.has_personality() && b.has_personality() {
        personality_score(&a.personality, &b.personality)
    } else {
        0.0
    };

    let total = (config.weight_interests * interests
        + config.weight_age * age
        + config.weight_personality * personality)
        .clamp(0.0, 1.0);

    Some(ScoreBreakdown { interests, age, personality, total })
}

/// Final compatibility score; 0.0 for safety-gated pairs.
pub fn score(a: &Profile, b: &Profile, weights: &TagWeights, config: &MatchingConfig) -> f64 {
    score_pair(a, b, weights, config).map_or(0.0, |s| s.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::PERSONALITY_DIMS;

    fn profile(age: i32, interests: &[&str]) -> Profile {
        let now = Utc::now();
        Profile {
            user_id: Uuid::new_v4(),
            display_name: "test".into(),
            pronouns: "iel".into(),
            age,
            raw_interests: interests.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            personality: vec![0.0; PERSONALITY_DIMS],
            activity_score: 1.0,
            opt_out_proactive: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn minor_adult_mix_scores_zero() {
        let cfg = MatchingConfig::default();
        let weights = TagWeights::default();
        let minor = profile(16, &["musique", "lecture", "art"]);
        let adult = profile(19, &["musique", "lecture", "art"]);
        assert_eq!(eligibility(&minor, &adult, &cfg), Eligibility::MinorAdultMix);
        assert_eq!(score(&minor, &adult, &weights, &cfg), 0.0);
        assert_eq!(score(&adult, &minor, &weights, &cfg), 0.0);
        assert!(score_pair(&minor, &adult, &weights, &cfg).is_none());
    }

    #[test]
    fn age_gap_gate() {
        let cfg = MatchingConfig::default();
        let a = profile(18, &["musique"]);
        let b = profile(27, &["musique"]);
        assert_eq!(eligibility(&a, &b, &cfg), Eligibility::AgeGapExceeded);
        let c = profile(26, &["musique"]);
        assert_eq!(eligibility(&a, &c, &cfg), Eligibility::Eligible);
    }

    #[test]
    fn out_of_band_age_gate() {
        let cfg = MatchingConfig::default();
        let mut a = profile(30, &["musique"]);
        a.age = 31; // bypasses input validation on purpose
        let b = profile(28, &["musique"]);
        assert_eq!(eligibility(&a, &b, &cfg), Eligibility::OutsideAgeBand);
    }

    #[test]
    fn age_score_decays_smoothly() {
        assert_eq!(age_score(20, 20, 4.0), 1.0);
        let near = age_score(20, 22, 4.0);
        let far = age_score(20, 26, 4.0);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn cosine_guards() {
        assert_eq!(personality_score(&[], &[]), 0.0);
        assert_eq!(personality_score(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(personality_score(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        let s = personality_score(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_interest_sets_hit_sparse_floor() {
        let mut cfg = MatchingConfig::default();
        cfg.sparse_floor = 0.25;
        let weights = TagWeights::default();
        let empty = BTreeSet::new();
        assert_eq!(interest_score(&empty, &empty, &weights, &cfg), 0.25);
        cfg.sparse_floor = 0.0;
        assert_eq!(interest_score(&empty, &empty, &weights, &cfg), 0.0);
    }

    #[test]
    fn score_is_bounded() {
        let cfg = MatchingConfig::default();
        let corpus: Vec<BTreeSet<String>> = vec![
            ["musique", "art"].iter().map(|s| s.to_string()).collect(),
            ["musique"].iter().map(|s| s.to_string()).collect(),
        ];
        let weights = TagWeights::compute(corpus.iter(), 1);
        let mut a = profile(22, &["musique", "art"]);
        let mut b = profile(22, &["musique", "art"]);
        a.personality = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        b.personality = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let s = score(&a, &b, &weights, &cfg);
        assert!((0.0..=1.0).contains(&s));
        // identical profiles: every sub-score is 1.0, total is the weight sum
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reference_scenario_matches_formula() {
        // A = {age 22, musique/lecture/art}, B = {age 24, musique/sport/cuisine}
        // with w(musique) = 1.5 and default weight 1.0 elsewhere; no fuzzy
        // pair reaches the 0.8 threshold across the remainders.
        let cfg = MatchingConfig::default();
        let a = profile(22, &["musique", "lecture", "art"]);
        let b = profile(24, &["musique", "sport", "cuisine"]);

        let mut map = std::collections::HashMap::new();
        map.insert("musique".to_string(), 1.5);
        let weights = TagWeights::from_map(map);

        let s_interests = interest_score(&a.interests, &b.interests, &weights, &cfg);
        // intersection {musique} = 1.5, union = 1.5 + 4 * 1.0 = 5.5
        assert!((s_interests - 1.5 / 5.5).abs() < 1e-12);

        let s_age = age_score(22, 24, cfg.age_sigma);
        let expected_age = (-(2.0f64 * 2.0) / (2.0 * 16.0)).exp();
        assert!((s_age - expected_age).abs() < 1e-12);

        let total = score(&a, &b, &weights, &cfg);
        let expected = cfg.weight_interests * (1.5 / 5.5) + cfg.weight_age * expected_age;
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn idf_weighting_shifts_interest_score() {
        // Corpus where "musique" is common (df 3 of 4) and the rest rare.
        let sets: Vec<BTreeSet<String>> = [
            vec!["musique", "lecture", "art"],
            vec!["musique", "sport", "cuisine"],
            vec!["musique"],
            vec!["voyage"],
        ]
        .iter()
        .map(|v| v.iter().map(|s| s.to_string()).collect())
        .collect();
        let weights = TagWeights::compute(sets.iter(), 1);
        let cfg = MatchingConfig::default();

        let a = profile(22, &["musique", "lecture", "art"]);
        let b = profile(24, &["musique", "sport", "cuisine"]);

        let w = |t: &str| weights.weight(t);
        let expected = w("musique")
            / (w("musique") + w("lecture") + w("art") + w("sport") + w("cuisine"));
        let got = interest_score(&a.interests, &b.interests, &weights, &cfg);
        assert!((got - expected).abs() < 1e-12);
        // sharing only the common tag scores below the unweighted 1/5
        assert!(got < 0.2);
    }
}
