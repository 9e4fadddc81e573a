//! Collaborator interfaces implemented by the persistence and messaging
//! glue. The engine only ever talks to these traits; it performs no retries
//! itself and expects each transition to be a single atomic write.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use affinity_shared::{AppResult, Event};

use crate::anonymize::CandidatePreview;
use crate::models::{
    ExclusionRecord, Match, MatchProposal, Profile, ProposalStatus, Report, ReportStatus,
};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    async fn all(&self) -> AppResult<Vec<Profile>>;
    async fn upsert(&self, profile: Profile) -> AppResult<()>;
    /// Deletes the profile and cascades to proposals, matches, exclusions
    /// and reports referencing the id. Returns false when absent.
    async fn delete(&self, user_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait ExclusionStore: Send + Sync {
    /// Union of non-expired exclusions for this user (passed + matched +
    /// reported), as seen at `now`.
    async fn list_excluded(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<HashSet<Uuid>>;
    async fn record(&self, record: ExclusionRecord) -> AppResult<()>;
    /// Drops records past expiry; returns how many were purged.
    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Persists a new proposal. Fails with `ProposalAlreadyActive` when a
    /// non-terminal proposal already exists for the unordered pair.
    async fn create(&self, proposal: MatchProposal) -> AppResult<MatchProposal>;
    async fn get_active(&self, a: Uuid, b: Uuid) -> AppResult<Option<MatchProposal>>;
    async fn get_by_nonce(&self, nonce: &str) -> AppResult<Option<MatchProposal>>;
    /// Compare-and-swap on status: the transition applies only if the
    /// proposal currently holds `from`, and returns `None` otherwise (the
    /// caller lost the race or replayed a handled action).
    async fn transition(
        &self,
        nonce: &str,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> AppResult<Option<MatchProposal>>;
    /// Converts stale pending proposals to `Expired`; idempotent and
    /// re-runnable. Returns the proposals it expired.
    async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<MatchProposal>>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn create(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Match>;
    async fn exists(&self, user_a: Uuid, user_b: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create(&self, report: Report) -> AppResult<Report>;
    async fn set_status(&self, report_id: Uuid, status: ReportStatus) -> AppResult<Option<Report>>;
    async fn list_pending(&self) -> AppResult<Vec<Report>>;
}

/// Bookkeeping for proactive suggestions: cooldowns and daily caps.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    async fn record(&self, user_id: Uuid, candidate_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<usize>;
}

/// Raised when the messaging collaborator could not reach a recipient.
/// Never rolls back a persisted transition; surfaced as degraded success.
#[derive(Debug, thiserror::Error)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    pub recipient: Uuid,
    pub reason: String,
}

/// Messaging collaborator. Rejections are deliberately silent: there is no
/// notify-rejection call at all.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Anonymized double opt-in notification carrying the proposal nonce.
    async fn notify_proposal(
        &self,
        target_id: Uuid,
        preview: CandidatePreview,
        nonce: &str,
    ) -> Result<(), DeliveryError>;

    /// Full-profile reveal after mutual consent.
    async fn notify_reveal(&self, user_id: Uuid, partner: Profile) -> Result<(), DeliveryError>;

    /// Proactive suggestion outside any proposal.
    async fn notify_suggestion(
        &self,
        user_id: Uuid,
        preview: CandidatePreview,
    ) -> Result<(), DeliveryError>;
}

/// Fire-and-forget sink for domain events; failures are logged upstream
/// and never affect persisted state.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, routing_key: &str, event: Event<serde_json::Value>)
        -> anyhow::Result<()>;
}

/// Serializes a typed payload into the dyn-friendly envelope.
pub fn envelope<T: Serialize>(
    event_type: &str,
    user_id: Option<Uuid>,
    data: T,
) -> Event<serde_json::Value> {
    let data = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
    let mut event = Event::new("affinity-matching", event_type, data);
    if let Some(user_id) = user_id {
        event = event.with_user(user_id);
    }
    event
}
