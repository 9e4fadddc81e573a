//! Periodic proactive suggestions: active users who have not opted out get
//! at most one anonymized candidate per cycle, throttled by a per-user
//! cooldown and a daily cap. Suggestions never create proposals or
//! exclusions; they only surface a candidate.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use affinity_shared::AppResult;

use crate::anonymize;
use crate::config::MatchingConfig;
use crate::engine::MatchEngine;
use crate::models::Profile;
use crate::ranker;

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    /// Users who passed every throttle this cycle.
    pub considered: usize,
    /// Suggestions actually delivered and recorded.
    pub sent: usize,
}

pub fn is_eligible(profile: &Profile, config: &MatchingConfig) -> bool {
    !profile.opt_out_proactive && profile.activity_score >= config.min_activity_score
}

/// One pass over the whole profile pool.
///
/// Delivery failures are logged and not recorded, so the user is retried
/// on the next cycle.
pub async fn run_cycle(engine: &MatchEngine, now: DateTime<Utc>) -> AppResult<CycleStats> {
    let config = engine.config();
    let stores = engine.stores();
    let weights = engine.current_weights().await;
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let cooldown_start = now - Duration::seconds(config.proactive_cooldown_secs);

    let mut stats = CycleStats::default();
    for profile in stores.profiles.all().await? {
        if !is_eligible(&profile, config) {
            continue;
        }
        let user_id = profile.user_id;
        if stores.suggestions.count_since(user_id, cooldown_start).await? > 0 {
            continue;
        }
        if stores.suggestions.count_since(user_id, day_start).await? >= config.max_daily_suggestions
        {
            continue;
        }
        stats.considered += 1;

        let excluded = stores.exclusions.list_excluded(user_id, now).await?;
        let ranked = ranker::rank(
            &profile,
            stores.profiles.as_ref(),
            &excluded,
            &weights,
            config,
            1,
        )
        .await?;
        let Some(top) = ranked.into_iter().next() else {
            continue;
        };

        let preview = anonymize::preview(&top.profile, top.score, engine.synonyms());
        match engine.notifier().notify_suggestion(user_id, preview).await {
            Ok(()) => {
                stores
                    .suggestions
                    .record(user_id, top.profile.user_id, now)
                    .await?;
                stats.sent += 1;
            }
            Err(e) => {
                tracing::warn!(recipient = %e.recipient, reason = %e.reason, "suggestion delivery failed");
            }
        }
    }

    if stats.sent > 0 {
        tracing::info!(sent = stats.sent, considered = stats.considered, "proactive cycle");
    }
    Ok(stats)
}

/// Spawns the recurring suggestion cycle when enabled by configuration.
pub fn spawn(engine: Arc<MatchEngine>) -> Option<tokio::task::JoinHandle<()>> {
    if !engine.config().proactive_enabled {
        return None;
    }
    let period = std::time::Duration::from_secs(engine.config().proactive_interval_secs);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = run_cycle(&engine, Utc::now()).await {
                tracing::error!(error = %e, "proactive cycle failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::anonymize::CandidatePreview;
    use crate::engine::EngineStores;
    use crate::memory::MemoryStore;
    use crate::models::ProfileInput;
    use crate::stores::{DeliveryError, Notifier, ProfileStore};
    use crate::tags::SynonymTable;

    #[derive(Default)]
    struct SuggestionLog {
        sent: Mutex<Vec<Uuid>>,
        fail_all: bool,
    }

    #[async_trait]
    impl Notifier for SuggestionLog {
        async fn notify_proposal(
            &self,
            _target_id: Uuid,
            _preview: CandidatePreview,
            _nonce: &str,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }

        async fn notify_reveal(
            &self,
            _user_id: Uuid,
            _partner: Profile,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }

        async fn notify_suggestion(
            &self,
            user_id: Uuid,
            _preview: CandidatePreview,
        ) -> Result<(), DeliveryError> {
            if self.fail_all {
                return Err(DeliveryError {
                    recipient: user_id,
                    reason: "socket closed".into(),
                });
            }
            self.sent.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    fn setup(config: MatchingConfig) -> (MatchEngine, Arc<MemoryStore>, Arc<SuggestionLog>) {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(SuggestionLog::default());
        let engine = MatchEngine::new(
            EngineStores::shared(store.clone()),
            log.clone(),
            None,
            config,
            SynonymTable::empty(),
        );
        (engine, store, log)
    }

    fn input(user_id: Uuid, opt_out: bool) -> ProfileInput {
        ProfileInput {
            user_id,
            display_name: "someone".into(),
            pronouns: "iel".into(),
            age: 20,
            interests: vec!["musique".into(), "sport".into(), "lecture".into()],
            description: String::new(),
            personality: None,
            opt_out_proactive: opt_out,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn eligible_users_each_get_one_suggestion() {
        let (engine, _store, log) = setup(MatchingConfig::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.upsert_profile(input(a, false)).await.unwrap();
        engine.upsert_profile(input(b, false)).await.unwrap();

        let stats = run_cycle(&engine, noon()).await.unwrap();
        assert_eq!(stats.considered, 2);
        assert_eq!(stats.sent, 2);
        let sent = log.sent.lock().unwrap().clone();
        assert!(sent.contains(&a));
        assert!(sent.contains(&b));
    }

    #[tokio::test]
    async fn opt_out_and_low_activity_are_skipped() {
        let (engine, store, log) = setup(MatchingConfig::default());
        let active = Uuid::new_v4();
        let opted_out = Uuid::new_v4();
        let dormant = Uuid::new_v4();
        engine.upsert_profile(input(active, false)).await.unwrap();
        engine.upsert_profile(input(opted_out, true)).await.unwrap();
        engine.upsert_profile(input(dormant, false)).await.unwrap();

        let mut p = store.get(dormant).await.unwrap().unwrap();
        p.activity_score = 0.2;
        ProfileStore::upsert(store.as_ref(), p).await.unwrap();

        run_cycle(&engine, noon()).await.unwrap();
        let sent = log.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![active]);
    }

    #[tokio::test]
    async fn cooldown_throttles_repeat_suggestions() {
        let (engine, _store, log) = setup(MatchingConfig::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.upsert_profile(input(a, false)).await.unwrap();
        engine.upsert_profile(input(b, false)).await.unwrap();

        run_cycle(&engine, noon()).await.unwrap();
        // an hour later, still inside the 24h cooldown
        let stats = run_cycle(&engine, noon() + Duration::hours(1)).await.unwrap();
        assert_eq!(stats.sent, 0);
        assert_eq!(log.sent.lock().unwrap().len(), 2);

        // past the cooldown the user is served again
        let stats = run_cycle(&engine, noon() + Duration::hours(25)).await.unwrap();
        assert_eq!(stats.sent, 2);
    }

    #[tokio::test]
    async fn daily_cap_binds_even_without_cooldown() {
        let config = MatchingConfig {
            proactive_cooldown_secs: 0,
            max_daily_suggestions: 2,
            ..MatchingConfig::default()
        };
        let (engine, _store, log) = setup(config);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.upsert_profile(input(a, false)).await.unwrap();
        engine.upsert_profile(input(b, false)).await.unwrap();

        let mut at = noon();
        for _ in 0..4 {
            at += Duration::minutes(1);
            run_cycle(&engine, at).await.unwrap();
        }
        // two users, two suggestions each
        assert_eq!(log.sent.lock().unwrap().len(), 4);

        // the counter resets at midnight
        let next_day = noon() + Duration::days(1);
        let stats = run_cycle(&engine, next_day).await.unwrap();
        assert_eq!(stats.sent, 2);
    }

    #[tokio::test]
    async fn spawn_is_gated_by_configuration() {
        let (engine, _store, _log) = setup(MatchingConfig::default());
        assert!(spawn(Arc::new(engine)).is_none());

        let config = MatchingConfig {
            proactive_enabled: true,
            ..MatchingConfig::default()
        };
        let (engine, _store, _log) = setup(config);
        let handle = spawn(Arc::new(engine)).expect("task should start");
        handle.abort();
    }

    #[tokio::test]
    async fn failed_delivery_is_not_recorded() {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(SuggestionLog {
            fail_all: true,
            ..SuggestionLog::default()
        });
        let engine = MatchEngine::new(
            EngineStores::shared(store.clone()),
            log,
            None,
            MatchingConfig::default(),
            SynonymTable::empty(),
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.upsert_profile(input(a, false)).await.unwrap();
        engine.upsert_profile(input(b, false)).await.unwrap();

        let stats = run_cycle(&engine, noon()).await.unwrap();
        assert_eq!(stats.sent, 0);
        // nothing recorded, so the next cycle retries immediately
        let stats = run_cycle(&engine, noon() + Duration::minutes(1)).await.unwrap();
        assert_eq!(stats.considered, 2);
        assert_eq!(stats.sent, 0);
    }
}
