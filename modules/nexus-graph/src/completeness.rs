//! Completeness evaluator.
//!
//! Scores how well the current graph covers the research space and picks the
//! periphery worth probing next. The whole graph is re-read on every call;
//! the result is a disposable snapshot.

use std::collections::{HashMap, HashSet, VecDeque};

use nexus_common::{
    normalize_id, CompletenessScores, CompletenessSnapshot, EntityRef, EntityRole, UnifiedGraph,
};

/// Role mix a well-rounded graph is expected to approach.
pub const TARGET_ROLE_SHARE: [(EntityRole, f64); 7] = [
    (EntityRole::Core, 0.20),
    (EntityRole::Supplier, 0.20),
    (EntityRole::Customer, 0.20),
    (EntityRole::Partner, 0.20),
    (EntityRole::Competitor, 0.15),
    (EntityRole::Other, 0.05),
    (EntityRole::Subsidiary, 0.0),
];

pub const WEIGHT_SEED_COVERAGE: f64 = 0.25;
pub const WEIGHT_ROLE_DIVERSITY: f64 = 0.20;
pub const WEIGHT_DEPTH_REACH: f64 = 0.20;
pub const WEIGHT_SOURCE_DENSITY: f64 = 0.20;
pub const WEIGHT_NOVELTY: f64 = 0.15;

/// Degree at which a seed counts as fully covered.
const SEED_DEGREE_TARGET: f64 = 3.0;
/// Mean BFS depth at which depth reach saturates.
const DEPTH_TARGET: f64 = 2.5;
const FRONTIER_MAX_DEGREE: usize = 2;
const HIGH_IMPACT_LIMIT: usize = 5;
const RECOMMENDED_SEED_LIMIT: usize = 5;

// =============================================================================
// Topology snapshot
// =============================================================================

/// Undirected degree and adjacency, indexed by position in `graph.nodes`.
/// Relationships with an endpoint that is not a live entity are ignored.
#[derive(Debug, Clone)]
pub struct Topology {
    position: HashMap<String, usize>,
    pub degree: Vec<usize>,
    pub adjacency: Vec<Vec<usize>>,
}

impl Topology {
    pub fn build(graph: &UnifiedGraph) -> Self {
        let position: HashMap<String, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(pos, n)| (n.id.clone(), pos))
            .collect();
        let mut degree = vec![0usize; graph.nodes.len()];
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];

        for link in &graph.links {
            let (Some(&s), Some(&t)) = (position.get(&link.source), position.get(&link.target)) else {
                continue;
            };
            degree[s] += 1;
            degree[t] += 1;
            if !adjacency[s].contains(&t) {
                adjacency[s].push(t);
            }
            if !adjacency[t].contains(&s) {
                adjacency[t].push(s);
            }
        }

        Self {
            position,
            degree,
            adjacency,
        }
    }

    pub fn position(&self, canonical_id: &str) -> Option<usize> {
        self.position.get(canonical_id).copied()
    }

    pub fn degree_of(&self, canonical_id: &str) -> usize {
        self.position(canonical_id).map(|p| self.degree[p]).unwrap_or(0)
    }

    /// Multi-source BFS. `None` for entities the sources cannot reach.
    pub fn bfs_depths(&self, sources: &[usize]) -> Vec<Option<usize>> {
        let mut depth: Vec<Option<usize>> = vec![None; self.degree.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &src in sources {
            if depth[src].is_none() {
                depth[src] = Some(0);
                queue.push_back(src);
            }
        }
        while let Some(node) = queue.pop_front() {
            let next = depth[node].unwrap_or(0) + 1;
            for &neighbor in &self.adjacency[node] {
                if depth[neighbor].is_none() {
                    depth[neighbor] = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        depth
    }
}

// =============================================================================
// Sub-metrics
// =============================================================================

/// Mean of `min(1, degree / 3)` over tracked seeds, plus the seeds below 1.0.
pub fn seed_coverage(topology: &Topology, seeds: &[String]) -> (f64, Vec<String>) {
    if seeds.is_empty() {
        return (0.0, Vec::new());
    }
    let mut total = 0.0;
    let mut under_covered = Vec::new();
    for seed in seeds {
        let coverage = (topology.degree_of(seed) as f64 / SEED_DEGREE_TARGET).min(1.0);
        if coverage < 1.0 {
            under_covered.push(seed.clone());
        }
        total += coverage;
    }
    (total / seeds.len() as f64, under_covered)
}

/// `1 - JSD(observed || target) / ln 2`, plus roles under half their target share.
pub fn role_diversity(graph: &UnifiedGraph) -> (f64, Vec<EntityRole>) {
    if graph.nodes.is_empty() {
        return (0.0, Vec::new());
    }
    let total = graph.nodes.len() as f64;
    let observed: Vec<f64> = TARGET_ROLE_SHARE
        .iter()
        .map(|(role, _)| graph.nodes.iter().filter(|n| n.role == *role).count() as f64 / total)
        .collect();
    let target: Vec<f64> = TARGET_ROLE_SHARE.iter().map(|(_, share)| *share).collect();

    let divergence = jensen_shannon(&observed, &target);
    let score = (1.0 - divergence / std::f64::consts::LN_2).clamp(0.0, 1.0);

    let missing = TARGET_ROLE_SHARE
        .iter()
        .zip(&observed)
        .filter(|((_, share), obs)| *share > 0.0 && **obs < share / 2.0)
        .map(|((role, _), _)| *role)
        .collect();

    (score, missing)
}

/// Jensen-Shannon divergence in nats.
fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(a, b)| (a + b) / 2.0).collect();
    0.5 * kullback_leibler(p, &m) + 0.5 * kullback_leibler(q, &m)
}

fn kullback_leibler(p: &[f64], m: &[f64]) -> f64 {
    p.iter()
        .zip(m)
        .filter(|(a, b)| **a > 0.0 && **b > 0.0)
        .map(|(a, b)| a * (a / b).ln())
        .sum()
}

/// `min(1, mean BFS depth / 2.5)` over every entity the BFS reaches.
pub fn depth_reach(depths: &[Option<usize>]) -> f64 {
    let reached: Vec<usize> = depths.iter().filter_map(|d| *d).collect();
    if reached.is_empty() {
        return 0.0;
    }
    let mean = reached.iter().sum::<usize>() as f64 / reached.len() as f64;
    (mean / DEPTH_TARGET).min(1.0)
}

/// Average of the evidenced-relationship share and the cited-citation share.
pub fn source_density(graph: &UnifiedGraph) -> f64 {
    let evidenced = if graph.links.is_empty() {
        0.0
    } else {
        graph.links.iter().filter(|l| !l.evidence_ids.is_empty()).count() as f64
            / graph.links.len() as f64
    };

    let referenced: HashSet<u64> = graph
        .links
        .iter()
        .flat_map(|l| l.evidence_ids.iter().copied())
        .collect();
    let cited = if graph.sources.is_empty() {
        0.0
    } else {
        graph.sources.iter().filter(|s| referenced.contains(&s.id)).count() as f64
            / graph.sources.len() as f64
    };

    (evidenced + cited) / 2.0
}

/// Shannon entropy of the degree distribution over connected entities,
/// normalized by `ln(max(2, entity count))`.
pub fn novelty(topology: &Topology) -> f64 {
    match topology.degree.len() {
        0 => return 0.0,
        1 => return 1.0,
        _ => {}
    }
    let total: usize = topology.degree.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let entropy: f64 = topology
        .degree
        .iter()
        .filter(|&&d| d > 0)
        .map(|&d| {
            let p = d as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    let normalizer = (topology.degree.len().max(2) as f64).ln();
    (entropy / normalizer).clamp(0.0, 1.0)
}

pub fn composite_score(scores: &CompletenessScores) -> f64 {
    (WEIGHT_SEED_COVERAGE * scores.seed_coverage
        + WEIGHT_ROLE_DIVERSITY * scores.role_diversity
        + WEIGHT_DEPTH_REACH * scores.depth_reach
        + WEIGHT_SOURCE_DENSITY * scores.source_density
        + WEIGHT_NOVELTY * scores.novelty)
        .clamp(0.0, 1.0)
}

// =============================================================================
// Snapshot
// =============================================================================

/// Score the graph against the tracked seeds (canonical ids or raw names).
pub fn evaluate(graph: &UnifiedGraph, tracked_seeds: &[String]) -> CompletenessSnapshot {
    if graph.nodes.is_empty() {
        return CompletenessSnapshot::default();
    }

    let mut seeds: Vec<String> = Vec::new();
    for seed in tracked_seeds {
        let id = normalize_id(seed);
        if !id.is_empty() && !seeds.contains(&id) {
            seeds.push(id);
        }
    }

    let topology = Topology::build(graph);

    let (seed_score, under_covered_ids) = seed_coverage(&topology, &seeds);
    let (role_score, missing_roles) = role_diversity(graph);

    let mut sources: Vec<usize> = seeds.iter().filter_map(|s| topology.position(s)).collect();
    if sources.is_empty() {
        sources.push(0);
    }
    let depths = topology.bfs_depths(&sources);

    let scores = CompletenessScores {
        seed_coverage: seed_score,
        role_diversity: role_score,
        depth_reach: depth_reach(&depths),
        source_density: source_density(graph),
        novelty: novelty(&topology),
    };

    let entity_ref = |pos: usize| {
        let node = &graph.nodes[pos];
        EntityRef {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role,
            degree: topology.degree[pos],
        }
    };

    let max_depth = depths.iter().filter_map(|d| *d).max();
    let frontier_entities: Vec<EntityRef> = (0..graph.nodes.len())
        .filter(|&pos| depths[pos].is_some() && depths[pos] == max_depth)
        .filter(|&pos| topology.degree[pos] <= FRONTIER_MAX_DEGREE)
        .map(entity_ref)
        .collect();

    let mut ranked: Vec<usize> = (0..graph.nodes.len())
        .filter(|&pos| topology.degree[pos] > 0)
        .collect();
    ranked.sort_by(|a, b| topology.degree[*b].cmp(&topology.degree[*a]));
    let high_impact_entities: Vec<EntityRef> =
        ranked.into_iter().take(HIGH_IMPACT_LIMIT).map(entity_ref).collect();

    let under_covered_entities: Vec<String> = under_covered_ids
        .iter()
        .map(|id| {
            topology
                .position(id)
                .map(|pos| graph.nodes[pos].name.clone())
                .unwrap_or_else(|| id.clone())
        })
        .collect();

    let mut recommended_seeds: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let candidates = frontier_entities
        .iter()
        .map(|e| e.name.clone())
        .chain(under_covered_entities.iter().cloned());
    for name in candidates {
        if recommended_seeds.len() >= RECOMMENDED_SEED_LIMIT {
            break;
        }
        if seen.insert(normalize_id(&name)) {
            recommended_seeds.push(name);
        }
    }

    CompletenessSnapshot {
        score: composite_score(&scores),
        scores,
        under_covered_entities,
        missing_roles,
        frontier_entities,
        recommended_seeds,
        high_impact_entities,
    }
}
