use std::collections::HashSet;

use uuid::Uuid;

use affinity_shared::AppResult;

use crate::config::MatchingConfig;
use crate::idf::TagWeights;
use crate::models::Profile;
use crate::scoring;
use crate::stores::ProfileStore;

/// One ranked candidate with the score frozen at ranking time.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub profile: Profile,
    pub score: f64,
}

/// Scores the whole eligible pool for `requester` and returns the top `k`.
///
/// A finite, non-restartable snapshot: every call re-reads the pool. Pure
/// read + compute; recording "viewed" exclusions is the caller's job.
/// Safety-gated candidates are silently absent, never reported as errors;
/// an empty result is the normal "no matches right now" outcome.
pub async fn rank(
    requester: &Profile,
    profiles: &dyn ProfileStore,
    exclusions: &HashSet<Uuid>,
    weights: &TagWeights,
    config: &MatchingConfig,
    top_k: usize,
) -> AppResult<Vec<RankedCandidate>> {
    let pool = profiles.all().await?;
    let mut candidates: Vec<RankedCandidate> = pool
        .into_iter()
        .filter(|p| p.user_id != requester.user_id && !exclusions.contains(&p.user_id))
        .filter_map(|p| {
            let breakdown = scoring::score_pair(requester, &p, weights, config)?;
            (breakdown.total >= config.min_score).then_some(RankedCandidate {
                profile: p,
                score: breakdown.total,
            })
        })
        .collect();

    // Deterministic order: score desc, activity desc, then id for
    // reproducible ties.
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.profile.activity_score.total_cmp(&a.profile.activity_score))
            .then(a.profile.user_id.cmp(&b.profile.user_id))
    });
    candidates.truncate(top_k);
    Ok(candidates)
}
