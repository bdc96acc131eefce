//! Quality-gated producer calls.
//!
//! Identical requests to the same producer often come back with materially
//! different answers, so a weak response is retried instead of accepted. Each
//! attempt is scored by how many of its relationships could survive the
//! evidence ledger; the best attempt wins and a good-enough score stops early.

use tracing::{debug, warn};

use nexus_common::RelationshipType;
use nexus_graph::evidence::usable_citation_ids;
use nexus_graph::ProducerPayload;

use crate::run_log::EventKind;
use crate::traits::{Producer, ProducerRequest, ProgressSink};

// --- Constants ---

pub const MAX_ATTEMPTS: usize = 3;
pub const EGO_MIN_LINKS: usize = 5;
pub const CROSS_MIN_LINKS: usize = 10;
pub const CROSS_MAX_LINKS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub max_attempts: usize,
    /// Stop retrying once an attempt scores at least this many valid links.
    pub min_links: usize,
    /// Keep at most this many relationships from the winning attempt.
    pub max_links: Option<usize>,
}

impl GatePolicy {
    pub const EGO_NETWORK: GatePolicy = GatePolicy {
        max_attempts: MAX_ATTEMPTS,
        min_links: EGO_MIN_LINKS,
        max_links: None,
    };

    pub const CROSS_LINKS: GatePolicy = GatePolicy {
        max_attempts: MAX_ATTEMPTS,
        min_links: CROSS_MIN_LINKS,
        max_links: Some(CROSS_MAX_LINKS),
    };
}

/// The attempt kept by the gate.
#[derive(Debug, Clone, Default)]
pub struct GatedResponse {
    /// Empty when every attempt failed or was unparsable.
    pub payload: ProducerPayload,
    pub score: usize,
    pub attempts: usize,
    pub failures: usize,
}

/// Relationships that name a source, a target and a known type, and cite at
/// least one citation the ledger would keep.
pub fn valid_link_count(payload: &ProducerPayload) -> usize {
    let usable = usable_citation_ids(&payload.sources);
    payload
        .links
        .iter()
        .filter(|link| link.source.is_some() && link.target.is_some())
        .filter(|link| {
            link.rel_type
                .as_deref()
                .and_then(RelationshipType::parse_loose)
                .is_some()
        })
        .filter(|link| link.evidence_ids.iter().any(|id| usable.contains(id)))
        .count()
}

/// Call `producer` up to `policy.max_attempts` times and keep the best attempt.
///
/// A failed call or an unparsable answer scores zero and counts as an empty
/// response; it never aborts the caller.
pub async fn call_with_quality_gate(
    producer: &dyn Producer,
    request: &ProducerRequest,
    policy: GatePolicy,
    progress: &dyn ProgressSink,
) -> GatedResponse {
    let label = request.label();
    let mut best: Option<(ProducerPayload, usize)> = None;
    let mut attempts = 0;
    let mut failures = 0;

    for attempt in 1..=policy.max_attempts.max(1) {
        attempts = attempt;
        let (payload, error) = match producer.produce(request).await {
            Ok(text) => match ProducerPayload::parse(&text) {
                Some(payload) => (payload, None),
                None => (ProducerPayload::default(), Some("unparsable response".to_string())),
            },
            Err(e) => {
                warn!(request = label.as_str(), attempt, error = %e, "Producer call failed");
                failures += 1;
                (ProducerPayload::default(), Some(e.to_string()))
            }
        };

        let score = valid_link_count(&payload);
        progress.record(EventKind::ProducerAttempt {
            request: label.clone(),
            attempt,
            valid_links: score,
            success: error.is_none(),
            error,
        });
        debug!(request = label.as_str(), attempt, score, "Producer attempt scored");

        if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
            best = Some((payload, score));
        }
        if score >= policy.min_links {
            break;
        }
    }

    let (mut payload, score) = best.unwrap_or_default();
    if let Some(cap) = policy.max_links {
        payload.links.truncate(cap);
    }
    if score < policy.min_links {
        debug!(request = label.as_str(), score, min = policy.min_links, "Kept best attempt below target");
    }

    GatedResponse {
        payload,
        score,
        attempts,
        failures,
    }
}
