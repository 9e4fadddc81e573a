use serde::Deserialize;

/// Which acceptance events are required before a proposal becomes a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcceptPolicy {
    /// The requester's `propose` already counts as their consent; a single
    /// accept from the target completes the match.
    #[default]
    SingleConfirm,
    /// The target's accept moves the proposal back to the requester, who
    /// must explicitly confirm before the match is created.
    Strict,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    // -- Score combination (normalized convex weights) --
    #[serde(default = "default_weight_interests")]
    pub weight_interests: f64,
    #[serde(default = "default_weight_personality")]
    pub weight_personality: f64,
    #[serde(default = "default_weight_age")]
    pub weight_age: f64,

    /// Gaussian width for the age sub-score.
    #[serde(default = "default_age_sigma")]
    pub age_sigma: f64,

    // -- Interest matching --
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// Fuzzy pairs count less than exact intersection.
    #[serde(default = "default_fuzzy_discount")]
    pub fuzzy_discount: f64,
    /// Interest sub-score used when the weighted union is empty.
    #[serde(default)]
    pub sparse_floor: f64,

    // -- Ranking --
    /// Candidates scoring below this are dropped from ranked output.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Hard cap on |age_a - age_b|.
    #[serde(default = "default_max_age_gap")]
    pub max_age_gap: i32,

    // -- Lifecycle windows --
    #[serde(default = "default_pass_ttl_secs")]
    pub pass_ttl_secs: i64,
    #[serde(default = "default_reject_exclusion_secs")]
    pub reject_exclusion_secs: i64,
    #[serde(default = "default_proposal_ttl_secs")]
    pub proposal_ttl_secs: i64,

    #[serde(default)]
    pub accept_policy: AcceptPolicy,

    // -- Proactive suggestions --
    #[serde(default)]
    pub proactive_enabled: bool,
    #[serde(default = "default_proactive_interval_secs")]
    pub proactive_interval_secs: u64,
    #[serde(default = "default_proactive_cooldown_secs")]
    pub proactive_cooldown_secs: i64,
    #[serde(default = "default_max_daily_suggestions")]
    pub max_daily_suggestions: usize,
    #[serde(default = "default_min_activity_score")]
    pub min_activity_score: f64,
}

fn default_weight_interests() -> f64 { 0.55 }
fn default_weight_personality() -> f64 { 0.25 }
fn default_weight_age() -> f64 { 0.20 }
fn default_age_sigma() -> f64 { 4.0 }
fn default_fuzzy_threshold() -> f64 { 0.8 }
fn default_fuzzy_discount() -> f64 { 0.8 }
fn default_min_score() -> f64 { 0.1 }
fn default_top_k() -> usize { 10 }
fn default_max_age_gap() -> i32 { 8 }
fn default_pass_ttl_secs() -> i64 { 4 * 3600 }
fn default_reject_exclusion_secs() -> i64 { 7 * 86400 }
fn default_proposal_ttl_secs() -> i64 { 86400 }
fn default_proactive_interval_secs() -> u64 { 3600 }
fn default_proactive_cooldown_secs() -> i64 { 24 * 3600 }
fn default_max_daily_suggestions() -> usize { 3 }
fn default_min_activity_score() -> f64 { 0.5 }

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weight_interests: default_weight_interests(),
            weight_personality: default_weight_personality(),
            weight_age: default_weight_age(),
            age_sigma: default_age_sigma(),
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_discount: default_fuzzy_discount(),
            sparse_floor: 0.0,
            min_score: default_min_score(),
            top_k: default_top_k(),
            max_age_gap: default_max_age_gap(),
            pass_ttl_secs: default_pass_ttl_secs(),
            reject_exclusion_secs: default_reject_exclusion_secs(),
            proposal_ttl_secs: default_proposal_ttl_secs(),
            accept_policy: AcceptPolicy::default(),
            proactive_enabled: false,
            proactive_interval_secs: default_proactive_interval_secs(),
            proactive_cooldown_secs: default_proactive_cooldown_secs(),
            max_daily_suggestions: default_max_daily_suggestions(),
            min_activity_score: default_min_activity_score(),
        }
    }
}

impl MatchingConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AFFINITY_MATCHING").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let cfg = MatchingConfig::default();
        assert_eq!(cfg.weight_interests, 0.55);
        assert_eq!(cfg.weight_personality, 0.25);
        assert_eq!(cfg.weight_age, 0.20);
        assert_eq!(cfg.age_sigma, 4.0);
        assert_eq!(cfg.fuzzy_threshold, 0.8);
        assert_eq!(cfg.max_age_gap, 8);
        assert_eq!(cfg.pass_ttl_secs, 4 * 3600);
        assert_eq!(cfg.accept_policy, AcceptPolicy::SingleConfirm);
        assert_eq!(cfg.sparse_floor, 0.0);
    }

    #[test]
    fn weights_are_normalized() {
        let cfg = MatchingConfig::default();
        let sum = cfg.weight_interests + cfg.weight_personality + cfg.weight_age;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
