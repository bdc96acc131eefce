//! Expansion controller scenarios driven by scripted producers.

use serde_json::{json, Value};

use nexus_common::{EntityRole, NexusError};
use nexus_graph::GraphAccumulator;
use nexus_scout::expansion::{ExpansionController, ExpansionLimits, SeedTask, StopReason};
use nexus_scout::run_log::EventKind;
use nexus_scout::testing::{citation, ego_response, link, node, MockProducer, RecordingProgress};

fn limits(max_rounds: usize, score_threshold: f64) -> ExpansionLimits {
    ExpansionLimits {
        max_rounds,
        score_threshold,
        batch_size: 4,
    }
}

fn seeds(names: &[&str]) -> Vec<SeedTask> {
    names.iter().map(|n| SeedTask::new(*n)).collect()
}

/// Build a response from (source, target, type) triples, one citation each.
fn response(nodes: Vec<Value>, triples: &[(&str, &str, &str)]) -> Value {
    let links: Vec<Value> = triples
        .iter()
        .enumerate()
        .map(|(i, (s, t, ty))| link(s, t, ty, i as u64 + 1))
        .collect();
    let sources: Vec<Value> = (1..=triples.len() as u64)
        .map(|id| citation(id, &format!("https://research.example.com/{id}")))
        .collect();
    json!({"nodes": nodes, "links": links, "sources": sources})
}

/// Two well-connected seeds with a balanced role mix. Round 0 alone scores
/// well above 0.72.
fn well_covered_producer() -> MockProducer {
    let nvidia = response(
        vec![
            node("NVIDIA", "Core"),
            node("SK Hynix", "Supplier"),
            node("Microsoft", "Customer"),
            node("Meta", "Customer"),
            node("Foxconn", "Partner"),
            node("Supermicro", "Partner"),
            node("AMD", "Competitor"),
        ],
        &[
            ("SK Hynix", "NVIDIA", "SupplyChain"),
            ("NVIDIA", "Microsoft", "Customer"),
            ("NVIDIA", "Meta", "Customer"),
            ("Foxconn", "NVIDIA", "Partner"),
            ("Supermicro", "NVIDIA", "Partner"),
            ("AMD", "NVIDIA", "Competitor"),
        ],
    );
    let tsmc = response(
        vec![
            node("TSMC", "Core"),
            node("ASML", "Supplier"),
            node("Intel", "Competitor"),
            node("NVIDIA", "Core"),
            node("AMD", "Competitor"),
            node("SK Hynix", "Supplier"),
        ],
        &[
            ("ASML", "TSMC", "SupplyChain"),
            ("TSMC", "NVIDIA", "SupplyChain"),
            ("Intel", "TSMC", "Competitor"),
            ("TSMC", "AMD", "SupplyChain"),
            ("SK Hynix", "TSMC", "Partner"),
        ],
    );
    MockProducer::new().on_seed("NVIDIA", nvidia).on_seed("TSMC", tsmc)
}

#[tokio::test]
async fn high_scoring_first_round_stops_without_expanding() {
    let producer = well_covered_producer();
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(2, 0.72), "AI compute");
    let outcome = controller.run(&mut acc, seeds(&["NVIDIA", "TSMC"])).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::ScoreThreshold);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.processed, vec!["NVIDIA", "TSMC"]);
    assert!(outcome.snapshot.score >= 0.72, "score {}", outcome.snapshot.score);

    let mut called = producer.seeds_called();
    called.sort();
    assert_eq!(called, vec!["NVIDIA", "TSMC"]);

    assert_eq!(acc.entity_count(), 10);
    assert_eq!(acc.graph().links.len(), 11);
    assert!(acc.graph().completeness.is_some());
    assert!(progress
        .events()
        .iter()
        .all(|e| !matches!(e, EventKind::SeedsQueued { .. })));
}

#[tokio::test]
async fn round_budget_caps_expansion() {
    let producer = MockProducer::new()
        .on_seed("NVIDIA", ego_response("NVIDIA", &["TSMC", "ASML"]))
        .on_seed("TSMC", ego_response("TSMC", &["Applied Materials"]))
        .fail_seed("ASML");
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(2, 0.99), "AI compute");
    let outcome = controller.run(&mut acc, seeds(&["NVIDIA"])).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::RoundBudget);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.processed, vec!["NVIDIA", "TSMC", "ASML"]);
    assert!(outcome.producer_failures >= 1);

    let amat = acc.entity("applied materials").expect("round 1 entity merged");
    assert_eq!(amat.layer.as_deref(), Some("expansion-1:frontier"));
    assert_eq!(acc.entity("nvidia").unwrap().role, EntityRole::Core);
    // TSMC named itself Core when queried; ASML never answered.
    assert_eq!(acc.entity("tsmc").unwrap().role, EntityRole::Core);
    assert_eq!(acc.entity("asml").unwrap().role, EntityRole::Supplier);

    let queued: Vec<_> = progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EventKind::SeedsQueued { round, seeds, layer } => Some((round, seeds, layer)),
            _ => None,
        })
        .collect();
    assert_eq!(
        queued,
        vec![(
            1,
            vec!["TSMC".to_string(), "ASML".to_string()],
            "expansion-1:frontier".to_string()
        )]
    );
}

#[tokio::test]
async fn exhausted_frontier_retries_under_covered_seeds_once() {
    let producer = MockProducer::new()
        .on_seed("NVIDIA", ego_response("NVIDIA", &["TSMC"]))
        .fail_seed("TSMC");
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(5, 0.99), "AI compute");
    let outcome = controller.run(&mut acc, seeds(&["NVIDIA"])).await.unwrap();

    // Round 0 seeds NVIDIA, round 1 expands TSMC, round 2 retries both
    // under-covered seeds, then nothing is left to try.
    assert_eq!(outcome.stop_reason, StopReason::FrontierExhausted);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.processed, vec!["NVIDIA", "TSMC"]);

    let layers: Vec<String> = progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EventKind::SeedsQueued { layer, .. } => Some(layer),
            _ => None,
        })
        .collect();
    assert_eq!(layers, vec!["expansion-1:frontier", "expansion-2:under-covered"]);

    let stopped = progress.events().into_iter().find_map(|e| match e {
        EventKind::ExpansionStopped { reason, .. } => Some(reason),
        _ => None,
    });
    assert_eq!(stopped, Some(StopReason::FrontierExhausted));
}

#[tokio::test]
async fn empty_first_round_is_fatal() {
    let producer = MockProducer::new()
        .fail_seed("NVIDIA")
        .on_seed_text("TSMC", "I could not find anything, sorry.");
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(2, 0.72), "AI compute");
    let err = controller
        .run(&mut acc, seeds(&["NVIDIA", "TSMC"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NexusError>(),
        Some(NexusError::NoGraphData)
    ));
    // Every failed or unparsable attempt was retried up to the limit.
    assert_eq!(producer.seeds_called().len(), 6);
}

#[tokio::test]
async fn seeds_are_promoted_to_core_whatever_the_producer_says() {
    let nvidia = json!({
        "nodes": [node("NVIDIA", "Core"), node("TSMC", "Supplier")],
        "links": [link("TSMC", "NVIDIA", "SupplyChain", 1)],
        "sources": [citation(1, "https://example.com/a")]
    });
    let producer = MockProducer::new()
        .on_seed("NVIDIA", nvidia)
        .on_seed("TSMC", json!({"nodes": [], "links": [], "sources": []}));
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(1, 0.72), "AI compute");
    let outcome = controller
        .run(&mut acc, seeds(&["NVIDIA", "TSMC", "Cloud Providers", "nvidia inc."]))
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::RoundBudget);
    assert_eq!(outcome.processed, vec!["NVIDIA", "TSMC"]);
    assert_eq!(acc.entity("tsmc").unwrap().role, EntityRole::Core);
    assert_eq!(acc.entity("tsmc").unwrap().layer.as_deref(), Some("seed"));
    assert!(!progress.snapshots().is_empty());
}

#[tokio::test]
async fn responses_merge_in_dispatch_order() {
    // Both responses describe Foxconn; the first dispatched seed's country wins.
    let a = json!({
        "nodes": [node("NVIDIA", "Core"), {"name": "Foxconn", "role": "Partner", "country": "Taiwan"}],
        "links": [link("Foxconn", "NVIDIA", "Partner", 1)],
        "sources": [citation(1, "https://example.com/a")]
    });
    let b = json!({
        "nodes": [node("Apple", "Core"), {"name": "Foxconn", "role": "Supplier", "country": "China"}],
        "links": [link("Foxconn", "Apple", "SupplyChain", 1)],
        "sources": [citation(1, "https://example.com/b")]
    });

    for _ in 0..3 {
        let producer = MockProducer::new().on_seed("NVIDIA", a.clone()).on_seed("Apple", b.clone());
        let progress = RecordingProgress::new();
        let mut acc = GraphAccumulator::new();
        let mut controller = ExpansionController::new(&producer, &progress, limits(1, 0.72), "devices");
        controller.run(&mut acc, seeds(&["NVIDIA", "Apple"])).await.unwrap();

        let foxconn = acc.entity("foxconn").unwrap();
        assert_eq!(foxconn.country.as_deref(), Some("Taiwan"));
        assert_eq!(foxconn.role, EntityRole::Partner);
        // Citation ids never collide across the two responses.
        let ids: Vec<u64> = acc.graph().sources.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}

#[tokio::test]
async fn seed_keyed_by_ticker_is_promoted_and_counted_as_covered() {
    let nvidia = json!({
        "nodes": [
            {"id": "NVDA", "name": "NVIDIA", "role": "Supplier"},
            {"id": "TSM", "name": "TSMC", "role": "Supplier"}
        ],
        "links": [link("TSM", "NVDA", "SupplyChain", 1)],
        "sources": [citation(1, "https://example.com/a")]
    });
    let producer = MockProducer::new().on_seed("NVIDIA", nvidia);
    let progress = RecordingProgress::new();
    let mut acc = GraphAccumulator::new();

    let mut controller = ExpansionController::new(&producer, &progress, limits(2, 0.99), "AI compute");
    let outcome = controller.run(&mut acc, seeds(&["NVIDIA"])).await.unwrap();

    assert_eq!(acc.entity("nvda").unwrap().role, EntityRole::Core);
    assert!(acc.entity("nvidia").is_none());
    assert_eq!(outcome.tracked_seeds, vec!["nvda", "tsm"]);

    // One edge each: partially covered, never scored as missing.
    let expected = 1.0 / 3.0;
    assert!((outcome.snapshot.scores.seed_coverage - expected).abs() < 1e-9);
    assert_eq!(outcome.snapshot.under_covered_entities, vec!["NVIDIA", "TSMC"]);

    // The seed is not mistaken for a fresh frontier entity.
    let queued: Vec<Vec<String>> = progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EventKind::SeedsQueued { seeds, .. } => Some(seeds),
            _ => None,
        })
        .collect();
    assert_eq!(queued, vec![vec!["TSMC".to_string()]]);
}
