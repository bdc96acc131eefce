//! Canonical merge engine.
//!
//! [`GraphAccumulator`] owns the graph being built and is the only thing that
//! mutates it. Entities enter through [`GraphAccumulator::merge_entity`],
//! relationships through [`GraphAccumulator::add_relationship`]; both run
//! every identity and evidence check, so the invariants hold no matter which
//! stage is feeding it.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use nexus_common::{
    is_generic_name, normalize_id, CompletenessSnapshot, DependencyDirection, Entity, EntityRole,
    EvidenceStrength, Materiality, Relationship, RelationshipType, ResearchReport, UnifiedGraph,
};

use crate::evidence::remap_response;
use crate::payload::{ProducerPayload, RawEndpoint, RawEntity, RawLink};

/// Placeholder producers emit when they have nothing. Never stored.
const UNKNOWN_PLACEHOLDER: &str = "unknown";

/// Why a relationship was or was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Admitted,
    /// An endpoint was absent, empty, or a collective name.
    MissingEndpoint,
    /// An endpoint resolved to an id with no live entity.
    UnknownEntity,
    UnknownType,
    /// No evidence id that resolves to an admitted citation.
    NoEvidence,
    /// (source, target, type) already present.
    Duplicate,
}

/// Fields the financial-quote lookup owns. Its values replace whatever an
/// extraction producer guessed.
pub const QUOTE_FIELDS: &[&str] = &[
    "ticker",
    "latestPrice",
    "marketCap",
    "sector",
    "sizeBucket",
    "primaryExchange",
];

/// How [`GraphAccumulator::apply_updates`] treats fields that already hold a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Fill empty fields only.
    FillEmpty,
    /// Overwrite [`QUOTE_FIELDS`], fill everything else.
    Quote,
}

impl UpdatePolicy {
    fn overwrites(self, field: &str) -> bool {
        self == UpdatePolicy::Quote && QUOTE_FIELDS.contains(&field)
    }
}

/// Per-response merge context.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Provenance label for entities that arrive without one.
    pub layer: Option<String>,
    /// Canonical ids merged with role `Core` regardless of what the producer said.
    pub core_ids: HashSet<String>,
    /// Cross-link responses may only connect entities already in the graph.
    pub admit_entities: bool,
    /// Mark every admitted relationship as a key relationship.
    pub key_relationship: bool,
}

impl MergeOptions {
    pub fn entities() -> Self {
        Self {
            admit_entities: true,
            ..Default::default()
        }
    }

    pub fn links_only() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_core_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.core_ids = ids.into_iter().collect();
        self
    }

    pub fn key_relationships(mut self) -> Self {
        self.key_relationship = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub entities_added: usize,
    pub entities_merged: usize,
    pub entities_rejected: usize,
    pub citations_added: usize,
    pub citations_dropped: usize,
    pub links_added: usize,
    pub links_duplicate: usize,
    pub links_rejected: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: &MergeStats) {
        self.entities_added += other.entities_added;
        self.entities_merged += other.entities_merged;
        self.entities_rejected += other.entities_rejected;
        self.citations_added += other.citations_added;
        self.citations_dropped += other.citations_dropped;
        self.links_added += other.links_added;
        self.links_duplicate += other.links_duplicate;
        self.links_rejected += other.links_rejected;
    }
}

/// Single-owner accumulator for the graph under construction.
#[derive(Debug, Default)]
pub struct GraphAccumulator {
    graph: UnifiedGraph,
    /// canonical id -> position in `graph.nodes`
    index: HashMap<String, usize>,
    /// raw producer string (id or name) -> canonical id
    aliases: HashMap<String, String>,
    link_keys: HashSet<(String, String, RelationshipType)>,
    evidence_ids: HashSet<u64>,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume accumulation on an existing graph.
    pub fn from_graph(graph: UnifiedGraph) -> Self {
        let mut acc = Self::default();
        for (pos, node) in graph.nodes.iter().enumerate() {
            acc.index.insert(node.id.clone(), pos);
            acc.aliases.entry(node.name.clone()).or_insert_with(|| node.id.clone());
        }
        for link in &graph.links {
            acc.link_keys
                .insert((link.source.clone(), link.target.clone(), link.rel_type));
        }
        acc.evidence_ids = graph.sources.iter().map(|s| s.id).collect();
        acc.graph = graph;
        acc
    }

    pub fn graph(&self) -> &UnifiedGraph {
        &self.graph
    }

    pub fn into_graph(self) -> UnifiedGraph {
        self.graph
    }

    pub fn entity_count(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn contains(&self, canonical_id: &str) -> bool {
        self.index.contains_key(canonical_id)
    }

    pub fn entity(&self, canonical_id: &str) -> Option<&Entity> {
        self.index.get(canonical_id).map(|&pos| &self.graph.nodes[pos])
    }

    pub fn set_completeness(&mut self, snapshot: CompletenessSnapshot) {
        self.graph.completeness = Some(snapshot);
    }

    pub fn set_report(&mut self, report: ResearchReport) {
        self.graph.summary = report.theme_overview.clone();
        self.graph.report = Some(report);
    }

    // --- Entities ---

    /// Fold one entity record into the graph. Returns the live entity, or
    /// `None` when the record names a collective or normalizes to nothing.
    pub fn merge_entity(&mut self, raw: &RawEntity) -> Option<&Entity> {
        let pos = self.merge_entity_at(raw, false, None)?;
        Some(&self.graph.nodes[pos])
    }

    fn merge_entity_at(&mut self, raw: &RawEntity, force_core: bool, layer: Option<&str>) -> Option<usize> {
        let key = raw.id.as_deref().or(raw.name.as_deref())?;
        if is_generic_name(key) || raw.name.as_deref().is_some_and(is_generic_name) {
            debug!(key, "Rejecting collective entity name");
            return None;
        }
        let canonical = normalize_id(key);
        if canonical.is_empty() {
            return None;
        }

        let role = if force_core { EntityRole::Core } else { raw.role };

        let pos = match self.index.get(&canonical).copied() {
            Some(pos) => {
                let existing = &mut self.graph.nodes[pos];
                if role == EntityRole::Core {
                    existing.role = EntityRole::Core;
                }
                pos
            }
            None => {
                let display = raw.name.as_deref().unwrap_or(key);
                let pos = self.graph.nodes.len();
                self.graph.nodes.push(Entity::new(canonical.clone(), display, role));
                self.index.insert(canonical.clone(), pos);
                pos
            }
        };

        let entity = &mut self.graph.nodes[pos];
        for (field, value) in &raw.scalars {
            fill_scalar(entity, field, value);
        }
        if let Some(layer) = layer {
            fill_scalar(entity, "layer", layer);
        }
        union_themes(&mut entity.key_themes, &raw.key_themes);

        for alias in [raw.id.as_deref(), raw.name.as_deref()].into_iter().flatten() {
            self.aliases
                .entry(alias.trim().to_string())
                .or_insert_with(|| canonical.clone());
        }

        Some(pos)
    }

    /// Resolve a raw endpoint reference to a canonical id. Does not check that
    /// the entity exists.
    pub fn map_to_canonical_id(&self, endpoint: &RawEndpoint) -> Option<String> {
        let candidates = endpoint.candidates();
        if candidates.iter().any(|c| is_generic_name(c)) {
            return None;
        }
        for candidate in &candidates {
            if let Some(canonical) = self.aliases.get(candidate.trim()) {
                return Some(canonical.clone());
            }
        }
        candidates
            .iter()
            .map(|c| normalize_id(c))
            .find(|id| !id.is_empty())
    }

    /// Canonical id of the entity a seed name refers to. Producers often key
    /// an entity by something other than the seed's own name (`NVDA` for
    /// "NVIDIA"), so the alias map is consulted before falling back to the
    /// normalized name.
    pub fn resolve_seed_id(&self, seed: &str) -> String {
        let normalized = normalize_id(seed);
        if self.index.contains_key(&normalized) {
            return normalized;
        }
        if let Some(canonical) = self.aliases.get(seed.trim()) {
            return canonical.clone();
        }
        self.aliases
            .iter()
            .filter(|(alias, _)| normalize_id(alias) == normalized)
            .map(|(_, canonical)| canonical)
            .min()
            .cloned()
            .unwrap_or(normalized)
    }

    // --- Relationships ---

    /// Admit one relationship whose evidence ids are already global.
    pub fn add_relationship(&mut self, link: RawLink) -> LinkOutcome {
        let (Some(source), Some(target)) = (&link.source, &link.target) else {
            return LinkOutcome::MissingEndpoint;
        };
        let (Some(source), Some(target)) =
            (self.map_to_canonical_id(source), self.map_to_canonical_id(target))
        else {
            return LinkOutcome::MissingEndpoint;
        };
        if !self.contains(&source) || !self.contains(&target) {
            return LinkOutcome::UnknownEntity;
        }
        let Some(rel_type) = link.rel_type.as_deref().and_then(RelationshipType::parse_loose) else {
            return LinkOutcome::UnknownType;
        };

        let mut evidence_ids: Vec<u64> = Vec::with_capacity(link.evidence_ids.len());
        for id in &link.evidence_ids {
            if self.evidence_ids.contains(id) && !evidence_ids.contains(id) {
                evidence_ids.push(*id);
            }
        }
        if evidence_ids.is_empty() {
            return LinkOutcome::NoEvidence;
        }

        let key = (source.clone(), target.clone(), rel_type);
        if self.link_keys.contains(&key) {
            return LinkOutcome::Duplicate;
        }
        self.link_keys.insert(key);

        self.graph.links.push(Relationship {
            source,
            target,
            rel_type,
            description: link.description,
            materiality: link.materiality.as_deref().and_then(Materiality::parse_loose),
            dependency_direction: link
                .dependency_direction
                .as_deref()
                .and_then(DependencyDirection::parse_loose),
            evidence_strength: link
                .evidence_strength
                .as_deref()
                .and_then(EvidenceStrength::parse_loose),
            is_key_relationship: link.is_key_relationship,
            evidence_ids,
        });
        LinkOutcome::Admitted
    }

    // --- Whole responses ---

    /// Merge one producer response: entities first, then the response's
    /// citations through the ledger, then its relationships.
    pub fn merge_response(&mut self, payload: &ProducerPayload, options: &MergeOptions) -> MergeStats {
        let mut stats = MergeStats::default();

        if options.admit_entities {
            for raw in &payload.nodes {
                // A producer may key a seed by ticker and keep its name, or the reverse.
                let force_core = [raw.id.as_deref(), raw.name.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|key| options.core_ids.contains(&normalize_id(key)));
                let existed = raw
                    .id
                    .as_deref()
                    .or(raw.name.as_deref())
                    .is_some_and(|key| self.contains(&normalize_id(key)));
                match self.merge_entity_at(raw, force_core, options.layer.as_deref()) {
                    Some(_) if existed => stats.entities_merged += 1,
                    Some(_) => stats.entities_added += 1,
                    None => stats.entities_rejected += 1,
                }
            }
        }

        let ledger = remap_response(self.graph.max_evidence_id(), &payload.sources, &payload.links);
        stats.citations_dropped = ledger.dropped_citations;
        stats.links_rejected += ledger.dropped_links;
        stats.citations_added = ledger.citations.len();
        for citation in ledger.citations {
            self.evidence_ids.insert(citation.id);
            self.graph.sources.push(citation);
        }

        for mut link in ledger.links {
            if options.key_relationship {
                link.is_key_relationship = Some(true);
            }
            match self.add_relationship(link) {
                LinkOutcome::Admitted => stats.links_added += 1,
                LinkOutcome::Duplicate => stats.links_duplicate += 1,
                outcome => {
                    debug!(?outcome, "Relationship rejected");
                    stats.links_rejected += 1;
                }
            }
        }

        stats
    }

    // --- Attribute updates ---

    /// Apply `{key: {field: value}}` updates from the quote and enrichment
    /// producers. Keys match a canonical id, an alias, or a display name.
    /// Empty fields are filled; populated ones change only where `policy`
    /// overwrites them. `id`, `name` and `role` never change.
    /// Returns the number of entities that gained or changed at least one value.
    pub fn apply_updates(&mut self, updates: &Map<String, Value>, policy: UpdatePolicy) -> usize {
        let mut changed = 0;
        for (key, update) in updates {
            let Some(fields) = update.as_object() else {
                continue;
            };
            if fields.keys().all(|k| k == "note") {
                debug!(key = key.as_str(), "Skipping note-only update");
                continue;
            }
            let Some(pos) = self.resolve_update_key(key) else {
                debug!(key = key.as_str(), "Update for unknown entity");
                continue;
            };

            let entity = &mut self.graph.nodes[pos];
            let mut touched = false;
            for (field, slot) in entity.scalar_fields_mut() {
                if field == "layer" || (slot.is_some() && !policy.overwrites(field)) {
                    continue;
                }
                if let Some(value) = fields.get(field).and_then(update_value) {
                    if slot.as_deref() != Some(value.as_str()) {
                        *slot = Some(value);
                        touched = true;
                    }
                }
            }
            let themes = theme_values(fields.get("keyThemes"));
            let before = entity.key_themes.len();
            union_themes(&mut entity.key_themes, &themes);
            touched |= entity.key_themes.len() > before;

            if touched {
                changed += 1;
            }
        }
        changed
    }

    fn resolve_update_key(&self, key: &str) -> Option<usize> {
        let trimmed = key.trim();
        if let Some(&pos) = self.index.get(trimmed) {
            return Some(pos);
        }
        if let Some(&pos) = self.aliases.get(trimmed).and_then(|id| self.index.get(id)) {
            return Some(pos);
        }
        if let Some(&pos) = self.index.get(&normalize_id(trimmed)) {
            return Some(pos);
        }
        self.graph
            .nodes
            .iter()
            .position(|n| n.name.eq_ignore_ascii_case(trimmed))
    }
}

// --- Field policy ---

fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_PLACEHOLDER)
}

/// First write wins: an existing value is never replaced.
fn fill_scalar(entity: &mut Entity, field: &str, value: &str) {
    if is_placeholder(value) {
        return;
    }
    for (name, slot) in entity.scalar_fields_mut() {
        if name == field {
            if slot.is_none() {
                *slot = Some(value.trim().to_string());
            }
            return;
        }
    }
}

fn union_themes(existing: &mut Vec<String>, incoming: &[String]) {
    for theme in incoming {
        let theme = theme.trim();
        if theme.is_empty() {
            continue;
        }
        if !existing.iter().any(|t| t.eq_ignore_ascii_case(theme)) {
            existing.push(theme.to_string());
        }
    }
}

fn update_value(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if is_placeholder(&rendered) {
        None
    } else {
        Some(rendered)
    }
}

fn theme_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !is_placeholder(s))
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .filter(|s| !is_placeholder(s))
            .map(|s| s.trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}
