//! Fire-and-forget publishers for matching domain events. Publish failures
//! are logged and swallowed; persisted state never depends on the sink.

use uuid::Uuid;

use affinity_shared::types::event::{payloads, routing_keys};

use crate::stores::{envelope, EventSink};

pub async fn publish_profile_upserted(
    sink: &dyn EventSink,
    user_id: Uuid,
    canonical_interest_count: usize,
) {
    let event = envelope(
        routing_keys::PROFILE_UPSERTED,
        Some(user_id),
        payloads::ProfileUpserted {
            user_id,
            canonical_interest_count,
        },
    );

    if let Err(e) = sink.publish(routing_keys::PROFILE_UPSERTED, event).await {
        tracing::error!(error = %e, "failed to publish profile.upserted event");
    }
}

pub async fn publish_profile_deleted(sink: &dyn EventSink, user_id: Uuid) {
    let event = envelope(
        routing_keys::PROFILE_DELETED,
        Some(user_id),
        payloads::ProfileDeleted { user_id },
    );

    if let Err(e) = sink.publish(routing_keys::PROFILE_DELETED, event).await {
        tracing::error!(error = %e, "failed to publish profile.deleted event");
    }
}

pub async fn publish_proposal_created(
    sink: &dyn EventSink,
    requester_id: Uuid,
    target_id: Uuid,
    score: f64,
) {
    let event = envelope(
        routing_keys::MATCHING_PROPOSAL_CREATED,
        Some(requester_id),
        payloads::ProposalCreated {
            requester_id,
            target_id,
            score,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MATCHING_PROPOSAL_CREATED, event).await {
        tracing::error!(error = %e, "failed to publish proposal.created event");
    }
}

pub async fn publish_proposal_rejected(sink: &dyn EventSink, requester_id: Uuid, target_id: Uuid) {
    let event = envelope(
        routing_keys::MATCHING_PROPOSAL_REJECTED,
        Some(target_id),
        payloads::ProposalRejected {
            requester_id,
            target_id,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MATCHING_PROPOSAL_REJECTED, event).await {
        tracing::error!(error = %e, "failed to publish proposal.rejected event");
    }
}

pub async fn publish_proposal_expired(sink: &dyn EventSink, requester_id: Uuid, target_id: Uuid) {
    let event = envelope(
        routing_keys::MATCHING_PROPOSAL_EXPIRED,
        Some(requester_id),
        payloads::ProposalExpired {
            requester_id,
            target_id,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MATCHING_PROPOSAL_EXPIRED, event).await {
        tracing::error!(error = %e, "failed to publish proposal.expired event");
    }
}

pub async fn publish_match_revealed(sink: &dyn EventSink, user_a: Uuid, user_b: Uuid, score: f64) {
    let event = envelope(
        routing_keys::MATCHING_MATCH_REVEALED,
        Some(user_a),
        payloads::MatchRevealed {
            user_a,
            user_b,
            score,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MATCHING_MATCH_REVEALED, event).await {
        tracing::error!(error = %e, "failed to publish match.revealed event");
    }
}

pub async fn publish_weights_refreshed(
    sink: &dyn EventSink,
    version: u64,
    profile_count: usize,
    tag_count: usize,
) {
    let event = envelope(
        routing_keys::MATCHING_WEIGHTS_REFRESHED,
        None,
        payloads::WeightsRefreshed {
            version,
            profile_count,
            tag_count,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MATCHING_WEIGHTS_REFRESHED, event).await {
        tracing::error!(error = %e, "failed to publish weights.refreshed event");
    }
}

pub async fn publish_report_created(
    sink: &dyn EventSink,
    report_id: Uuid,
    reporter_id: Uuid,
    reported_id: Uuid,
) {
    let event = envelope(
        routing_keys::MODERATION_REPORT_CREATED,
        Some(reporter_id),
        payloads::ReportCreated {
            report_id,
            reporter_id,
            reported_id,
        },
    );

    if let Err(e) = sink.publish(routing_keys::MODERATION_REPORT_CREATED, event).await {
        tracing::error!(error = %e, "failed to publish report.created event");
    }
}
