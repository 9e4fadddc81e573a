use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use affinity_shared::{AppError, AppResult, ErrorCode};

use crate::tags::{self, SynonymTable};

/// Platform-wide allowed age band, inclusive.
pub const MIN_AGE: i32 = 13;
pub const MAX_AGE: i32 = 30;
/// Members below this age are minors and are never mixed with adults.
pub const ADULT_AGE: i32 = 18;
/// Fixed length of the optional personality vector.
pub const PERSONALITY_DIMS: usize = 5;

// --- Profile ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub pronouns: String,
    pub age: i32,
    /// Free-text interests as entered, order preserved.
    pub raw_interests: Vec<String>,
    /// Canonical tags derived from `raw_interests`; recomputed on every edit.
    pub interests: BTreeSet<String>,
    pub description: String,
    pub personality: Vec<f64>,
    pub activity_score: f64,
    pub opt_out_proactive: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_minor(&self) -> bool {
        self.age < ADULT_AGE
    }

    pub fn has_personality(&self) -> bool {
        self.personality.iter().any(|v| *v != 0.0)
    }
}

/// Validated input for creating or editing a profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileInput {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub display_name: String,
    #[validate(length(max = 32))]
    pub pronouns: String,
    pub age: i32,
    #[validate(length(min = 3, max = 20))]
    pub interests: Vec<String>,
    #[validate(length(max = 500))]
    pub description: String,
    pub personality: Option<Vec<f64>>,
    #[serde(default)]
    pub opt_out_proactive: bool,
}

impl ProfileInput {
    /// Validates the input and derives the canonical interest set.
    pub fn into_profile(self, synonyms: &SynonymTable, now: DateTime<Utc>) -> AppResult<Profile> {
        self.validate()?;

        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(AppError::new(
                ErrorCode::AgeOutOfRange,
                format!("age must be between {MIN_AGE} and {MAX_AGE}"),
            ));
        }

        let personality = match self.personality {
            Some(v) if v.len() != PERSONALITY_DIMS => {
                return Err(AppError::new(
                    ErrorCode::PersonalityLengthMismatch,
                    format!("personality vector must have {PERSONALITY_DIMS} dimensions"),
                ));
            }
            Some(v) => v,
            None => vec![0.0; PERSONALITY_DIMS],
        };

        let interests = tags::canonicalize_interests(&self.interests, synonyms);
        if interests.is_empty() {
            return Err(AppError::new(
                ErrorCode::NotEnoughInterests,
                "interests are empty after normalization",
            ));
        }

        Ok(Profile {
            user_id: self.user_id,
            display_name: self.display_name,
            pronouns: self.pronouns,
            age: self.age,
            raw_interests: self.interests,
            interests,
            description: self.description,
            personality,
            activity_score: 1.0,
            opt_out_proactive: self.opt_out_proactive,
            created_at: now,
            updated_at: now,
        })
    }
}

// --- MatchProposal ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    PendingTarget,
    /// Strict accept policy only: target accepted, awaiting the requester's
    /// explicit confirmation.
    PendingRequester,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingTarget => "pending_target",
            Self::PendingRequester => "pending_requester",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchProposal {
    pub requester_id: Uuid,
    pub target_id: Uuid,
    /// Unguessable token binding accept/reject actions to this proposal.
    pub nonce: String,
    pub status: ProposalStatus,
    /// Compatibility at proposal time, frozen.
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MatchProposal {
    pub fn involves(&self, a: Uuid, b: Uuid) -> bool {
        (self.requester_id == a && self.target_id == b)
            || (self.requester_id == b && self.target_id == a)
    }
}

// --- Match ---

/// Symmetric pair record created on mutual consent. `user_a < user_b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn new(x: Uuid, y: Uuid, created_at: DateTime<Utc>) -> Self {
        let (user_a, user_b) = ordered_pair(x, y);
        Self { user_a, user_b, created_at }
    }
}

/// Canonical unordered-pair ordering used for uniqueness checks.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}

// --- ExclusionRecord ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Passed,
    Matched,
    Reported,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Matched => "matched",
            Self::Reported => "reported",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub user_id: Uuid,
    pub excluded_id: Uuid,
    pub reason: ExclusionReason,
    pub created_at: DateTime<Utc>,
    /// `None` means the exclusion never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExclusionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

// --- Report ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Actioned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(age: i32) -> ProfileInput {
        ProfileInput {
            user_id: Uuid::new_v4(),
            display_name: "Lou".into(),
            pronouns: "iel".into(),
            age,
            interests: vec!["Musique".into(), "lecture".into(), "art".into()],
            description: "bonjour".into(),
            personality: None,
            opt_out_proactive: false,
        }
    }

    #[test]
    fn input_builds_canonical_profile() {
        let profile = input(22).into_profile(&SynonymTable::default(), Utc::now()).unwrap();
        assert_eq!(profile.interests.len(), 3);
        assert!(profile.interests.contains("musique"));
        assert_eq!(profile.personality, vec![0.0; PERSONALITY_DIMS]);
        assert!(!profile.has_personality());
        assert!(!profile.is_minor());
    }

    #[test]
    fn age_band_is_enforced() {
        let err = input(12).into_profile(&SynonymTable::default(), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::AgeOutOfRange));
        let err = input(31).into_profile(&SynonymTable::default(), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::AgeOutOfRange));
        assert!(input(13).into_profile(&SynonymTable::default(), Utc::now()).is_ok());
        assert!(input(30).into_profile(&SynonymTable::default(), Utc::now()).is_ok());
    }

    #[test]
    fn minimum_interest_count() {
        let mut bad = input(20);
        bad.interests = vec!["musique".into(), "art".into()];
        assert!(matches!(
            bad.into_profile(&SynonymTable::default(), Utc::now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn personality_length_checked() {
        let mut bad = input(20);
        bad.personality = Some(vec![1.0, 2.0]);
        let err = bad.into_profile(&SynonymTable::default(), Utc::now()).unwrap_err();
        assert!(err.is(ErrorCode::PersonalityLengthMismatch));
    }

    #[test]
    fn pair_ordering_is_canonical() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ProposalStatus::PendingTarget.is_terminal());
        assert!(!ProposalStatus::PendingRequester.is_terminal());
        assert!(ProposalStatus::Accepted.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
        assert!(ProposalStatus::Expired.is_terminal());
    }

    #[test]
    fn exclusion_expiry() {
        let now = Utc::now();
        let rec = ExclusionRecord {
            user_id: Uuid::new_v4(),
            excluded_id: Uuid::new_v4(),
            reason: ExclusionReason::Passed,
            created_at: now,
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(rec.is_expired(now));
        let permanent = ExclusionRecord { expires_at: None, ..rec };
        assert!(!permanent.is_expired(now));
    }
}
