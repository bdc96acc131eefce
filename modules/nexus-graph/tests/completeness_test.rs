use nexus_common::{EntityRole, UnifiedGraph};
use nexus_graph::completeness::{evaluate, WEIGHT_ROLE_DIVERSITY};
use nexus_graph::{GraphAccumulator, MergeOptions, ProducerPayload, RawEntity};
use serde_json::json;

fn seeds(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn empty_graph_scores_zero_with_empty_lists() {
    let snapshot = evaluate(&UnifiedGraph::default(), &seeds(&["NVIDIA"]));
    assert_eq!(snapshot.score, 0.0);
    assert!(snapshot.frontier_entities.is_empty());
    assert!(snapshot.under_covered_entities.is_empty());
    assert!(snapshot.high_impact_entities.is_empty());
    assert!(snapshot.recommended_seeds.is_empty());
}

#[test]
fn single_isolated_entity() {
    let mut acc = GraphAccumulator::new();
    acc.merge_entity(&RawEntity::named("Lonely Widgets").with_role(EntityRole::Core));

    let snapshot = evaluate(acc.graph(), &[]);
    assert_eq!(snapshot.scores.novelty, 1.0);
    assert_eq!(snapshot.scores.depth_reach, 0.0);
    assert_eq!(snapshot.scores.seed_coverage, 0.0);
    assert_eq!(snapshot.scores.source_density, 0.0);
    assert_eq!(snapshot.frontier_entities.len(), 1);
    assert!(snapshot.high_impact_entities.is_empty());

    // Only role diversity and novelty contribute.
    let expected = WEIGHT_ROLE_DIVERSITY * snapshot.scores.role_diversity + 0.15;
    assert!((snapshot.score - expected).abs() < 1e-9);
}

/// NVIDIA -> TSMC -> ASML chain plus a Supermicro customer: the chain's far
/// end is the frontier, NVIDIA is the highest-impact node.
fn chain_graph() -> UnifiedGraph {
    let mut acc = GraphAccumulator::new();
    let payload = ProducerPayload::from_value(&json!({
        "nodes": [
            {"name": "NVIDIA", "role": "Core"},
            {"name": "TSMC", "role": "Supplier"},
            {"name": "ASML", "role": "Supplier"},
            {"name": "Supermicro", "role": "Customer"}
        ],
        "sources": [
            {"id": 1, "title": "a", "url": "https://a.example.com"},
            {"id": 2, "title": "b", "url": "https://b.example.com"},
            {"id": 3, "title": "unused", "url": "https://c.example.com"}
        ],
        "links": [
            {"source": "NVIDIA", "target": "TSMC", "type": "SupplyChain", "sourceIds": [1]},
            {"source": "TSMC", "target": "ASML", "type": "SupplyChain", "sourceIds": [2]},
            {"source": "Supermicro", "target": "NVIDIA", "type": "Customer", "sourceIds": [1, 2]}
        ]
    }));
    acc.merge_response(&payload, &MergeOptions::entities());
    acc.into_graph()
}

#[test]
fn chain_graph_metrics() {
    let graph = chain_graph();
    let snapshot = evaluate(&graph, &seeds(&["NVIDIA"]));

    // degree(nvidia) = 2 of 3
    assert!((snapshot.scores.seed_coverage - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(snapshot.under_covered_entities, vec!["NVIDIA".to_string()]);

    // depths: nvidia 0, tsmc 1, supermicro 1, asml 2 -> mean 1.0
    assert!((snapshot.scores.depth_reach - 1.0 / 2.5).abs() < 1e-9);

    // every link evidenced, 2 of 3 citations referenced
    assert!((snapshot.scores.source_density - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-9);

    let frontier: Vec<&str> = snapshot.frontier_entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(frontier, vec!["asml"]);

    assert_eq!(snapshot.high_impact_entities[0].id, "nvidia");
    assert_eq!(snapshot.high_impact_entities.len(), 4);

    assert_eq!(snapshot.recommended_seeds, vec!["ASML".to_string(), "NVIDIA".to_string()]);
    assert!(snapshot.missing_roles.contains(&EntityRole::Partner));
    assert!(snapshot.missing_roles.contains(&EntityRole::Competitor));
    assert!(!snapshot.missing_roles.contains(&EntityRole::Supplier));

    assert!(snapshot.score > 0.0 && snapshot.score < 1.0);
}

#[test]
fn absent_seeds_start_bfs_from_first_entity() {
    let graph = chain_graph();
    let snapshot = evaluate(&graph, &seeds(&["Samsung"]));
    assert_eq!(snapshot.scores.seed_coverage, 0.0);
    assert_eq!(snapshot.under_covered_entities, vec!["samsung".to_string()]);
    assert!((snapshot.scores.depth_reach - 1.0 / 2.5).abs() < 1e-9);
}

#[test]
fn score_is_recomputed_not_accumulated() {
    let graph = chain_graph();
    let first = evaluate(&graph, &seeds(&["NVIDIA"]));
    let second = evaluate(&graph, &seeds(&["NVIDIA"]));
    assert_eq!(first, second);
}
