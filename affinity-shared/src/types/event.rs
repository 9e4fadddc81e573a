use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all domain events handed to the event sink.
///
/// Routing key format: `affinity.{domain}.{entity}.{action}`
/// Example: `affinity.matching.proposal.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Routing keys for domain events
pub mod routing_keys {
    // Profile events
    pub const PROFILE_UPSERTED: &str = "affinity.profile.profile.upserted";
    pub const PROFILE_DELETED: &str = "affinity.profile.profile.deleted";

    // Matching events
    pub const MATCHING_PROPOSAL_CREATED: &str = "affinity.matching.proposal.created";
    pub const MATCHING_PROPOSAL_REJECTED: &str = "affinity.matching.proposal.rejected";
    pub const MATCHING_PROPOSAL_EXPIRED: &str = "affinity.matching.proposal.expired";
    pub const MATCHING_MATCH_REVEALED: &str = "affinity.matching.match.revealed";
    pub const MATCHING_WEIGHTS_REFRESHED: &str = "affinity.matching.weights.refreshed";

    // Moderation events
    pub const MODERATION_REPORT_CREATED: &str = "affinity.moderation.report.created";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProfileUpserted {
        pub user_id: Uuid,
        pub canonical_interest_count: usize,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProfileDeleted {
        pub user_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProposalCreated {
        pub requester_id: Uuid,
        pub target_id: Uuid,
        pub score: f64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProposalRejected {
        pub requester_id: Uuid,
        pub target_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProposalExpired {
        pub requester_id: Uuid,
        pub target_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchRevealed {
        pub user_a: Uuid,
        pub user_b: Uuid,
        pub score: f64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct WeightsRefreshed {
        pub version: u64,
        pub profile_count: usize,
        pub tag_count: usize,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ReportCreated {
        pub report_id: Uuid,
        pub reporter_id: Uuid,
        pub reported_id: Uuid,
    }
}
