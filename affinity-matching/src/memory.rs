//! In-memory reference implementation of every collaborator store, used by
//! the test suite and as the adapter contract: one write lock per mutation
//! gives the atomic check-and-set the engine requires from any real store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use affinity_shared::{AppError, AppResult, ErrorCode};

use crate::models::{
    ordered_pair, ExclusionRecord, Match, MatchProposal, Profile, ProposalStatus, Report,
    ReportStatus,
};
use crate::stores::{
    ExclusionStore, MatchStore, ProfileStore, ProposalStore, ReportStore, SuggestionStore,
};

#[derive(Default)]
struct State {
    profiles: HashMap<Uuid, Profile>,
    proposals: Vec<MatchProposal>,
    matches: Vec<Match>,
    exclusions: Vec<ExclusionRecord>,
    reports: Vec<Report>,
    suggestions: Vec<(Uuid, Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: forces an exclusion's expiry into the past.
    #[cfg(test)]
    pub(crate) async fn backdate_exclusions(&self, user_id: Uuid, excluded_id: Uuid) {
        let mut state = self.state.write().await;
        for record in &mut state.exclusions {
            if record.user_id == user_id && record.excluded_id == excluded_id {
                record.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
            }
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }

    async fn all(&self) -> AppResult<Vec<Profile>> {
        Ok(self.state.read().await.profiles.values().cloned().collect())
    }

    async fn upsert(&self, profile: Profile) -> AppResult<()> {
        self.state.write().await.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let existed = state.profiles.remove(&user_id).is_some();
        if existed {
            // cascade to everything referencing the id
            state.proposals.retain(|p| p.requester_id != user_id && p.target_id != user_id);
            state.matches.retain(|m| m.user_a != user_id && m.user_b != user_id);
            state
                .exclusions
                .retain(|e| e.user_id != user_id && e.excluded_id != user_id);
            state
                .reports
                .retain(|r| r.reporter_id != user_id && r.reported_id != user_id);
            state.suggestions.retain(|(u, c, _)| *u != user_id && *c != user_id);
        }
        Ok(existed)
    }
}

#[async_trait]
impl ExclusionStore for MemoryStore {
    async fn list_excluded(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<HashSet<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .exclusions
            .iter()
            .filter(|e| e.user_id == user_id && !e.is_expired(now))
            .map(|e| e.excluded_id)
            .collect())
    }

    async fn record(&self, record: ExclusionRecord) -> AppResult<()> {
        let mut state = self.state.write().await;
        // refresh rather than accumulate duplicates for the same edge+reason
        state
            .exclusions
            .retain(|e| {
                !(e.user_id == record.user_id
                    && e.excluded_id == record.excluded_id
                    && e.reason == record.reason)
            });
        state.exclusions.push(record);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.state.write().await;
        let before = state.exclusions.len();
        state.exclusions.retain(|e| !e.is_expired(now));
        Ok(before - state.exclusions.len())
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn create(&self, proposal: MatchProposal) -> AppResult<MatchProposal> {
        let mut state = self.state.write().await;
        let pair = ordered_pair(proposal.requester_id, proposal.target_id);
        let active_exists = state.proposals.iter().any(|p| {
            ordered_pair(p.requester_id, p.target_id) == pair && !p.status.is_terminal()
        });
        if active_exists {
            return Err(AppError::new(
                ErrorCode::ProposalAlreadyActive,
                "an active proposal already exists for this pair",
            ));
        }
        state.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn get_active(&self, a: Uuid, b: Uuid) -> AppResult<Option<MatchProposal>> {
        let state = self.state.read().await;
        Ok(state
            .proposals
            .iter()
            .find(|p| p.involves(a, b) && !p.status.is_terminal())
            .cloned())
    }

    async fn get_by_nonce(&self, nonce: &str) -> AppResult<Option<MatchProposal>> {
        let state = self.state.read().await;
        Ok(state.proposals.iter().find(|p| p.nonce == nonce).cloned())
    }

    async fn transition(
        &self,
        nonce: &str,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> AppResult<Option<MatchProposal>> {
        let mut state = self.state.write().await;
        match state.proposals.iter_mut().find(|p| p.nonce == nonce) {
            Some(p) if p.status == from => {
                p.status = to;
                p.updated_at = Utc::now();
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<MatchProposal>> {
        let mut state = self.state.write().await;
        let mut expired = Vec::new();
        for p in &mut state.proposals {
            if !p.status.is_terminal() && p.expires_at <= now {
                p.status = ProposalStatus::Expired;
                p.updated_at = now;
                expired.push(p.clone());
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn create(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Match> {
        let mut state = self.state.write().await;
        let record = Match::new(user_a, user_b, Utc::now());
        if state
            .matches
            .iter()
            .any(|m| m.user_a == record.user_a && m.user_b == record.user_b)
        {
            return Err(AppError::new(
                ErrorCode::AlreadyMatched,
                "this pair is already matched",
            ));
        }
        state.matches.push(record.clone());
        Ok(record)
    }

    async fn exists(&self, user_a: Uuid, user_b: Uuid) -> AppResult<bool> {
        let (a, b) = ordered_pair(user_a, user_b);
        let state = self.state.read().await;
        Ok(state.matches.iter().any(|m| m.user_a == a && m.user_b == b))
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn create(&self, report: Report) -> AppResult<Report> {
        self.state.write().await.reports.push(report.clone());
        Ok(report)
    }

    async fn set_status(&self, report_id: Uuid, status: ReportStatus) -> AppResult<Option<Report>> {
        let mut state = self.state.write().await;
        match state.reports.iter_mut().find(|r| r.id == report_id) {
            Some(r) => {
                r.status = status;
                Ok(Some(r.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> AppResult<Vec<Report>> {
        let state = self.state.read().await;
        Ok(state
            .reports
            .iter()
            .filter(|r| r.status == ReportStatus::Pending)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SuggestionStore for MemoryStore {
    async fn record(&self, user_id: Uuid, candidate_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.state.write().await.suggestions.push((user_id, candidate_id, at));
        Ok(())
    }

    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<usize> {
        let state = self.state.read().await;
        Ok(state
            .suggestions
            .iter()
            .filter(|(u, _, at)| *u == user_id && *at > since)
            .count())
    }
}
