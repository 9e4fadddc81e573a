//! Orchestrates the whole matching lifecycle over pluggable stores: profile
//! ingestion, weight refreshes, ranking, double opt-in proposals, rejection
//! and pass exclusions, reports, and the expiry sweep.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use affinity_shared::{AppError, AppResult, ErrorCode};

use crate::anonymize;
use crate::config::{AcceptPolicy, MatchingConfig};
use crate::events;
use crate::idf::TagWeights;
use crate::models::{
    ordered_pair, ExclusionReason, ExclusionRecord, Match, MatchProposal, Profile, ProfileInput,
    ProposalStatus, Report, ReportStatus,
};
use crate::ranker::{self, RankedCandidate};
use crate::scoring::{self, ScoreBreakdown};
use crate::stores::{
    EventSink, ExclusionStore, MatchStore, Notifier, ProfileStore, ProposalStore, ReportStore,
    SuggestionStore,
};
use crate::tags::SynonymTable;

/// The persistence collaborators the engine runs against.
pub struct EngineStores {
    pub profiles: Arc<dyn ProfileStore>,
    pub exclusions: Arc<dyn ExclusionStore>,
    pub proposals: Arc<dyn ProposalStore>,
    pub matches: Arc<dyn MatchStore>,
    pub reports: Arc<dyn ReportStore>,
    pub suggestions: Arc<dyn SuggestionStore>,
}

impl EngineStores {
    /// Wires every store role to one backing implementation.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ProfileStore
            + ExclusionStore
            + ProposalStore
            + MatchStore
            + ReportStore
            + SuggestionStore
            + 'static,
    {
        Self {
            profiles: store.clone(),
            exclusions: store.clone(),
            proposals: store.clone(),
            matches: store.clone(),
            reports: store.clone(),
            suggestions: store,
        }
    }
}

/// Result of creating a proposal. `delivered` is false when the target
/// notification failed; the proposal itself is still live.
#[derive(Debug, Clone)]
pub struct ProposeOutcome {
    pub proposal: MatchProposal,
    pub delivered: bool,
}

/// Result of an accept call.
#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    /// Both sides consented; identities were revealed. `failed_reveals`
    /// lists recipients whose reveal notification could not be delivered.
    Matched {
        record: Match,
        score: f64,
        failed_reveals: Vec<Uuid>,
    },
    /// Strict policy only: the target accepted, the requester must confirm.
    AwaitingRequester(MatchProposal),
    /// The proposal already reached a terminal state; nothing changed.
    AlreadyHandled(ProposalStatus),
}

/// Result of a reject call.
#[derive(Debug, Clone)]
pub enum RejectOutcome {
    Rejected(MatchProposal),
    AlreadyHandled(ProposalStatus),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub proposals_expired: usize,
    pub exclusions_purged: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CorpusStats {
    pub profile_count: usize,
    pub tag_count: usize,
    pub weights_version: u64,
}

pub struct MatchEngine {
    stores: EngineStores,
    notifier: Arc<dyn Notifier>,
    events: Option<Arc<dyn EventSink>>,
    config: MatchingConfig,
    synonyms: SynonymTable,
    weights: RwLock<Arc<TagWeights>>,
}

impl MatchEngine {
    pub fn new(
        stores: EngineStores,
        notifier: Arc<dyn Notifier>,
        events: Option<Arc<dyn EventSink>>,
        config: MatchingConfig,
        synonyms: SynonymTable,
    ) -> Self {
        Self {
            stores,
            notifier,
            events,
            config,
            synonyms,
            weights: RwLock::new(Arc::new(TagWeights::default())),
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Current corpus weight snapshot. Callers may hold this across awaits;
    /// refreshes swap the pointer and never mutate a published snapshot.
    pub async fn current_weights(&self) -> Arc<TagWeights> {
        self.weights.read().await.clone()
    }

    /// Recomputes corpus weights from every stored profile and publishes a
    /// new snapshot under the next version.
    pub async fn refresh_weights(&self) -> AppResult<Arc<TagWeights>> {
        let profiles = self.stores.profiles.all().await?;
        let version = self.weights.read().await.version + 1;
        let corpus: Vec<&BTreeSet<String>> = profiles.iter().map(|p| &p.interests).collect();
        let next = Arc::new(TagWeights::compute(corpus, version));

        tracing::info!(
            version,
            profiles = next.profile_count,
            tags = next.tag_count(),
            "refreshed corpus weights"
        );
        *self.weights.write().await = next.clone();

        if let Some(sink) = &self.events {
            events::publish_weights_refreshed(
                sink.as_ref(),
                version,
                next.profile_count,
                next.tag_count(),
            )
            .await;
        }
        Ok(next)
    }

    /// Validates and stores a profile, then refreshes corpus weights.
    ///
    /// Edits keep the original creation time and accumulated activity score.
    pub async fn upsert_profile(&self, input: ProfileInput) -> AppResult<Profile> {
        let now = Utc::now();
        let existing = self.stores.profiles.get(input.user_id).await?;
        let mut profile = input.into_profile(&self.synonyms, now)?;
        if let Some(prev) = existing {
            profile.created_at = prev.created_at;
            profile.activity_score = prev.activity_score;
        }

        self.stores.profiles.upsert(profile.clone()).await?;
        self.refresh_weights().await?;

        if let Some(sink) = &self.events {
            events::publish_profile_upserted(
                sink.as_ref(),
                profile.user_id,
                profile.interests.len(),
            )
            .await;
        }
        Ok(profile)
    }

    /// Removes a profile and everything referencing it, then refreshes
    /// corpus weights. Returns false when the profile did not exist.
    pub async fn delete_profile(&self, user_id: Uuid) -> AppResult<bool> {
        let existed = self.stores.profiles.delete(user_id).await?;
        if existed {
            self.refresh_weights().await?;
            if let Some(sink) = &self.events {
                events::publish_profile_deleted(sink.as_ref(), user_id).await;
            }
        }
        Ok(existed)
    }

    /// Top-k ranked candidates for a user, minus every active exclusion.
    pub async fn find_matches(&self, requester_id: Uuid) -> AppResult<Vec<RankedCandidate>> {
        let requester = self.require_profile(requester_id).await?;
        let now = Utc::now();
        let excluded = self.stores.exclusions.list_excluded(requester_id, now).await?;
        let weights = self.current_weights().await;
        ranker::rank(
            &requester,
            self.stores.profiles.as_ref(),
            &excluded,
            &weights,
            &self.config,
            self.config.top_k,
        )
        .await
    }

    /// Opens a double opt-in proposal from `requester_id` toward `target_id`
    /// and notifies the target with an anonymized preview of the requester.
    pub async fn propose(&self, requester_id: Uuid, target_id: Uuid) -> AppResult<ProposeOutcome> {
        if requester_id == target_id {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "cannot propose to yourself",
            ));
        }
        let requester = self.require_profile(requester_id).await?;
        let target = self.require_profile(target_id).await?;

        if self.stores.matches.exists(requester_id, target_id).await? {
            return Err(AppError::new(
                ErrorCode::AlreadyMatched,
                "this pair is already matched",
            ));
        }

        let weights = self.current_weights().await;
        let Some(breakdown) = scoring::score_pair(&requester, &target, &weights, &self.config)
        else {
            return Err(AppError::new(
                ErrorCode::NotEligible,
                "pair is outside the eligibility gate",
            ));
        };

        let now = Utc::now();
        let nonce = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        let proposal = self
            .stores
            .proposals
            .create(MatchProposal {
                requester_id,
                target_id,
                nonce: nonce.clone(),
                status: ProposalStatus::PendingTarget,
                score: breakdown.total,
                created_at: now,
                updated_at: now,
                expires_at: now + Duration::seconds(self.config.proposal_ttl_secs),
            })
            .await?;

        let preview = anonymize::preview(&requester, breakdown.total, &self.synonyms);
        let delivered = match self.notifier.notify_proposal(target_id, preview, &nonce).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(recipient = %e.recipient, reason = %e.reason, "proposal notification failed");
                false
            }
        };

        if let Some(sink) = &self.events {
            events::publish_proposal_created(sink.as_ref(), requester_id, target_id, breakdown.total)
                .await;
        }
        Ok(ProposeOutcome { proposal, delivered })
    }

    /// Records a consent on an open proposal, identified by its nonce.
    ///
    /// Exactly one caller wins the transition into `Accepted`; replays and
    /// racing calls observe `AlreadyHandled`.
    pub async fn respond_accept(&self, actor_id: Uuid, nonce: &str) -> AppResult<AcceptOutcome> {
        let proposal = self.require_proposal(nonce).await?;
        self.require_participant(&proposal, actor_id)?;

        if proposal.status.is_terminal() {
            return Ok(AcceptOutcome::AlreadyHandled(proposal.status));
        }
        self.check_expiry(&proposal).await?;

        let from = proposal.status;
        let accepted = match (self.config.accept_policy, from, actor_id) {
            (AcceptPolicy::SingleConfirm, ProposalStatus::PendingTarget, actor)
                if actor == proposal.target_id =>
            {
                self.stores
                    .proposals
                    .transition(nonce, from, ProposalStatus::Accepted)
                    .await?
            }
            (AcceptPolicy::Strict, ProposalStatus::PendingTarget, actor)
                if actor == proposal.target_id =>
            {
                match self
                    .stores
                    .proposals
                    .transition(nonce, from, ProposalStatus::PendingRequester)
                    .await?
                {
                    Some(updated) => return Ok(AcceptOutcome::AwaitingRequester(updated)),
                    None => return self.lost_race(nonce).await,
                }
            }
            (AcceptPolicy::Strict, ProposalStatus::PendingRequester, actor)
                if actor == proposal.requester_id =>
            {
                self.stores
                    .proposals
                    .transition(nonce, from, ProposalStatus::Accepted)
                    .await?
            }
            _ => {
                return Err(AppError::conflict(
                    "this proposal is not awaiting your consent",
                ));
            }
        };

        let Some(accepted) = accepted else {
            return self.lost_race(nonce).await;
        };

        // Reveal happens only after the match record is durable. A store
        // failure here rolls the proposal back so a retry can win again.
        let record = match self
            .stores
            .matches
            .create(accepted.requester_id, accepted.target_id)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                match self
                    .stores
                    .proposals
                    .transition(nonce, ProposalStatus::Accepted, from)
                    .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::error!(nonce, "failed to roll back accepted proposal: state moved");
                    }
                    Err(rollback) => {
                        tracing::error!(nonce, error = %rollback, "failed to roll back accepted proposal");
                    }
                }
                return Err(e);
            }
        };

        let now = Utc::now();
        self.exclude_both(accepted.requester_id, accepted.target_id, ExclusionReason::Matched, None, now)
            .await?;

        let mut failed_reveals = Vec::new();
        for (recipient, partner_id) in [
            (accepted.requester_id, accepted.target_id),
            (accepted.target_id, accepted.requester_id),
        ] {
            match self.stores.profiles.get(partner_id).await? {
                Some(partner) => {
                    if let Err(e) = self.notifier.notify_reveal(recipient, partner).await {
                        tracing::warn!(recipient = %e.recipient, reason = %e.reason, "reveal notification failed");
                        failed_reveals.push(recipient);
                    }
                }
                None => failed_reveals.push(recipient),
            }
        }

        if let Some(sink) = &self.events {
            events::publish_match_revealed(sink.as_ref(), record.user_a, record.user_b, accepted.score)
                .await;
        }
        Ok(AcceptOutcome::Matched {
            record,
            score: accepted.score,
            failed_reveals,
        })
    }

    /// Declines an open proposal. The requester is never notified; both
    /// directions are excluded from ranking for the configured window.
    pub async fn respond_reject(&self, actor_id: Uuid, nonce: &str) -> AppResult<RejectOutcome> {
        let proposal = self.require_proposal(nonce).await?;
        self.require_participant(&proposal, actor_id)?;

        if proposal.status.is_terminal() {
            return Ok(RejectOutcome::AlreadyHandled(proposal.status));
        }
        self.check_expiry(&proposal).await?;

        let Some(rejected) = self
            .stores
            .proposals
            .transition(nonce, proposal.status, ProposalStatus::Rejected)
            .await?
        else {
            let current = self.require_proposal(nonce).await?;
            return Ok(RejectOutcome::AlreadyHandled(current.status));
        };

        let now = Utc::now();
        let until = Some(now + Duration::seconds(self.config.reject_exclusion_secs));
        self.exclude_both(
            rejected.requester_id,
            rejected.target_id,
            ExclusionReason::Passed,
            until,
            now,
        )
        .await?;

        if let Some(sink) = &self.events {
            events::publish_proposal_rejected(
                sink.as_ref(),
                rejected.requester_id,
                rejected.target_id,
            )
            .await;
        }
        Ok(RejectOutcome::Rejected(rejected))
    }

    /// Hides a candidate from the caller's ranked results for the pass
    /// window. One direction only; no proposal is involved.
    pub async fn pass(&self, user_id: Uuid, candidate_id: Uuid) -> AppResult<()> {
        let now = Utc::now();
        self.stores
            .exclusions
            .record(ExclusionRecord {
                user_id,
                excluded_id: candidate_id,
                reason: ExclusionReason::Passed,
                created_at: now,
                expires_at: Some(now + Duration::seconds(self.config.pass_ttl_secs)),
            })
            .await
    }

    /// Files a report and permanently severs the pair in both directions.
    pub async fn report(
        &self,
        reporter_id: Uuid,
        reported_id: Uuid,
        reason: impl Into<String>,
    ) -> AppResult<Report> {
        if reporter_id == reported_id {
            return Err(AppError::new(
                ErrorCode::CannotReportSelf,
                "cannot report yourself",
            ));
        }
        self.require_profile(reported_id).await?;

        let now = Utc::now();
        let report = self
            .stores
            .reports
            .create(Report {
                id: Uuid::new_v4(),
                reporter_id,
                reported_id,
                reason: reason.into(),
                status: ReportStatus::Pending,
                created_at: now,
            })
            .await?;

        self.exclude_both(reporter_id, reported_id, ExclusionReason::Reported, None, now)
            .await?;

        if let Some(sink) = &self.events {
            events::publish_report_created(sink.as_ref(), report.id, reporter_id, reported_id)
                .await;
        }
        Ok(report)
    }

    /// Expires stale proposals and drops elapsed exclusions.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepStats> {
        let expired = self.stores.proposals.expire_stale(now).await?;
        for proposal in &expired {
            if let Some(sink) = &self.events {
                events::publish_proposal_expired(
                    sink.as_ref(),
                    proposal.requester_id,
                    proposal.target_id,
                )
                .await;
            }
        }
        let purged = self.stores.exclusions.purge_expired(now).await?;
        if !expired.is_empty() || purged > 0 {
            tracing::debug!(expired = expired.len(), purged, "sweep pass");
        }
        Ok(SweepStats {
            proposals_expired: expired.len(),
            exclusions_purged: purged,
        })
    }

    /// Score breakdown for an arbitrary pair; `None` when the safety gate
    /// excludes it.
    pub async fn inspect_pair(&self, a: Uuid, b: Uuid) -> AppResult<Option<ScoreBreakdown>> {
        let pa = self.require_profile(a).await?;
        let pb = self.require_profile(b).await?;
        let weights = self.current_weights().await;
        Ok(scoring::score_pair(&pa, &pb, &weights, &self.config))
    }

    pub async fn stats(&self) -> AppResult<CorpusStats> {
        let weights = self.current_weights().await;
        Ok(CorpusStats {
            profile_count: weights.profile_count,
            tag_count: weights.tag_count(),
            weights_version: weights.version,
        })
    }

    pub(crate) fn stores(&self) -> &EngineStores {
        &self.stores
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub(crate) fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    async fn require_profile(&self, user_id: Uuid) -> AppResult<Profile> {
        self.stores.profiles.get(user_id).await?.ok_or_else(|| {
            AppError::new(ErrorCode::ProfileNotFound, format!("profile {user_id} not found"))
        })
    }

    async fn require_proposal(&self, nonce: &str) -> AppResult<MatchProposal> {
        self.stores.proposals.get_by_nonce(nonce).await?.ok_or_else(|| {
            AppError::new(ErrorCode::ProposalNotFound, "no proposal for this nonce")
        })
    }

    fn require_participant(&self, proposal: &MatchProposal, actor_id: Uuid) -> AppResult<()> {
        if actor_id != proposal.requester_id && actor_id != proposal.target_id {
            return Err(AppError::new(
                ErrorCode::NotYourProposal,
                "you are not part of this proposal",
            ));
        }
        Ok(())
    }

    /// Expires a proposal in place when its deadline already passed.
    async fn check_expiry(&self, proposal: &MatchProposal) -> AppResult<()> {
        if proposal.expires_at > Utc::now() {
            return Ok(());
        }
        if self
            .stores
            .proposals
            .transition(&proposal.nonce, proposal.status, ProposalStatus::Expired)
            .await?
            .is_some()
        {
            if let Some(sink) = &self.events {
                events::publish_proposal_expired(
                    sink.as_ref(),
                    proposal.requester_id,
                    proposal.target_id,
                )
                .await;
            }
        }
        Err(AppError::new(
            ErrorCode::ProposalExpired,
            "this proposal has expired",
        ))
    }

    async fn lost_race(&self, nonce: &str) -> AppResult<AcceptOutcome> {
        let current = self.require_proposal(nonce).await?;
        Ok(AcceptOutcome::AlreadyHandled(current.status))
    }

    async fn exclude_both(
        &self,
        a: Uuid,
        b: Uuid,
        reason: ExclusionReason,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let (x, y) = ordered_pair(a, b);
        for (user_id, excluded_id) in [(x, y), (y, x)] {
            self.stores
                .exclusions
                .record(ExclusionRecord {
                    user_id,
                    excluded_id,
                    reason,
                    created_at: now,
                    expires_at,
                })
                .await?;
        }
        Ok(())
    }
}

/// Spawns the periodic expiry sweep; runs until the engine is dropped.
pub fn spawn_sweeper(
    engine: Arc<MatchEngine>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.sweep(Utc::now()).await {
                tracing::error!(error = %e, "expiry sweep failed");
            }
        }
    })
}
