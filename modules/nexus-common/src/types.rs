use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum EntityRole {
    Core,
    Supplier,
    Customer,
    Competitor,
    Partner,
    Subsidiary,
    Other,
}

impl EntityRole {
    pub const ALL: [EntityRole; 7] = [
        EntityRole::Core,
        EntityRole::Supplier,
        EntityRole::Customer,
        EntityRole::Competitor,
        EntityRole::Partner,
        EntityRole::Subsidiary,
        EntityRole::Other,
    ];

    /// Case-insensitive parse of a producer-supplied role. Unknown strings
    /// land in `Other` rather than rejecting the entity.
    pub fn parse_loose(raw: &str) -> EntityRole {
        match raw.trim().to_lowercase().as_str() {
            "core" => EntityRole::Core,
            "supplier" => EntityRole::Supplier,
            "customer" => EntityRole::Customer,
            "competitor" => EntityRole::Competitor,
            "partner" => EntityRole::Partner,
            "subsidiary" => EntityRole::Subsidiary,
            _ => EntityRole::Other,
        }
    }
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRole::Core => write!(f, "Core"),
            EntityRole::Supplier => write!(f, "Supplier"),
            EntityRole::Customer => write!(f, "Customer"),
            EntityRole::Competitor => write!(f, "Competitor"),
            EntityRole::Partner => write!(f, "Partner"),
            EntityRole::Subsidiary => write!(f, "Subsidiary"),
            EntityRole::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum RelationshipType {
    SupplyChain,
    Equity,
    Competitor,
    Partner,
    Acquisition,
    Customer,
}

impl RelationshipType {
    /// Case-insensitive parse; tolerates "supply_chain" / "supply chain".
    /// Unknown types are `None` and the relationship is rejected.
    pub fn parse_loose(raw: &str) -> Option<RelationshipType> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "supplychain" | "supplier" => Some(RelationshipType::SupplyChain),
            "equity" => Some(RelationshipType::Equity),
            "competitor" | "competition" => Some(RelationshipType::Competitor),
            "partner" | "partnership" => Some(RelationshipType::Partner),
            "acquisition" => Some(RelationshipType::Acquisition),
            "customer" => Some(RelationshipType::Customer),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipType::SupplyChain => write!(f, "SupplyChain"),
            RelationshipType::Equity => write!(f, "Equity"),
            RelationshipType::Competitor => write!(f, "Competitor"),
            RelationshipType::Partner => write!(f, "Partner"),
            RelationshipType::Acquisition => write!(f, "Acquisition"),
            RelationshipType::Customer => write!(f, "Customer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Materiality {
    High,
    Medium,
    Low,
}

impl Materiality {
    pub fn parse_loose(raw: &str) -> Option<Materiality> {
        match raw.trim().to_lowercase().as_str() {
            "high" => Some(Materiality::High),
            "medium" => Some(Materiality::Medium),
            "low" => Some(Materiality::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DependencyDirection {
    OneWay,
    Mutual,
}

impl DependencyDirection {
    pub fn parse_loose(raw: &str) -> Option<DependencyDirection> {
        match raw.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "oneway" => Some(DependencyDirection::OneWay),
            "mutual" => Some(DependencyDirection::Mutual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EvidenceStrength {
    Confirmed,
    Speculative,
}

impl EvidenceStrength {
    pub fn parse_loose(raw: &str) -> Option<EvidenceStrength> {
        match raw.trim().to_lowercase().as_str() {
            "confirmed" => Some(EvidenceStrength::Confirmed),
            "speculative" => Some(EvidenceStrength::Speculative),
            _ => None,
        }
    }
}

// --- Graph records ---

/// A company node. `id` is always the canonical form of the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub role: EntityRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income: Option<String>,
    /// Provenance tag: which seed layer or expansion round produced the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: EntityRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            country: None,
            note: None,
            ticker: None,
            primary_exchange: None,
            sector: None,
            industry: None,
            size_bucket: None,
            growth_profile: None,
            key_themes: Vec::new(),
            risk_notes: None,
            latest_price: None,
            market_cap: None,
            revenue: None,
            net_income: None,
            layer: None,
        }
    }

    /// Mutable handles to every optional scalar attribute, keyed by wire name.
    /// Merge and update policies walk this list so a new field only needs
    /// adding here.
    pub fn scalar_fields_mut(&mut self) -> [(&'static str, &mut Option<String>); 14] {
        [
            ("country", &mut self.country),
            ("note", &mut self.note),
            ("ticker", &mut self.ticker),
            ("primaryExchange", &mut self.primary_exchange),
            ("sector", &mut self.sector),
            ("industry", &mut self.industry),
            ("sizeBucket", &mut self.size_bucket),
            ("growthProfile", &mut self.growth_profile),
            ("riskNotes", &mut self.risk_notes),
            ("latestPrice", &mut self.latest_price),
            ("marketCap", &mut self.market_cap),
            ("revenue", &mut self.revenue),
            ("netIncome", &mut self.net_income),
            ("layer", &mut self.layer),
        ]
    }
}

/// A directed, evidence-backed edge between two canonical entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materiality: Option<Materiality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_direction: Option<DependencyDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_strength: Option<EvidenceStrength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_key_relationship: Option<bool>,
    /// Global evidence ids. Never empty for an admitted relationship.
    #[serde(rename = "sourceIds")]
    pub evidence_ids: Vec<u64>,
}

/// A citation backing one or more relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    pub id: u64,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// --- Completeness ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessScores {
    pub seed_coverage: f64,
    pub role_diversity: f64,
    pub depth_reach: f64,
    pub source_density: f64,
    pub novelty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    pub name: String,
    pub role: EntityRole,
    pub degree: usize,
}

/// Derived view of how well the graph covers the research space. Recomputed
/// wholesale after every expansion round, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessSnapshot {
    pub score: f64,
    pub scores: CompletenessScores,
    pub under_covered_entities: Vec<String>,
    pub missing_roles: Vec<EntityRole>,
    pub frontier_entities: Vec<EntityRef>,
    pub recommended_seeds: Vec<String>,
    pub high_impact_entities: Vec<EntityRef>,
}

// --- Report ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub node_id: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskEntry {
    pub node_id: String,
    #[serde(default)]
    pub risk_factor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub theme_overview: String,
    #[serde(default)]
    pub key_players: Vec<ReportEntry>,
    #[serde(default)]
    pub second_tier_beneficiaries: Vec<ReportEntry>,
    #[serde(default)]
    pub risk_nodes: Vec<RiskEntry>,
    #[serde(default)]
    pub suggested_next_steps: Vec<String>,
    #[serde(default)]
    pub disclaimer: String,
}

// --- Graph ---

/// The emitted artifact: everything downstream stages and the UI consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedGraph {
    #[serde(default)]
    pub summary: String,
    pub nodes: Vec<Entity>,
    pub links: Vec<Relationship>,
    pub sources: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ResearchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessSnapshot>,
}

impl UnifiedGraph {
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn max_evidence_id(&self) -> u64 {
        self.sources.iter().map(|s| s.id).max().unwrap_or(0)
    }
}

// --- Pipeline ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Idle,
    Inference,
    SeedAnalysis,
    Quotes,
    CrossLinks,
    Enrichment,
    Report,
    Complete,
    Error,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Idle => write!(f, "idle"),
            PipelineStage::Inference => write!(f, "inference"),
            PipelineStage::SeedAnalysis => write!(f, "seed-analysis"),
            PipelineStage::Quotes => write!(f, "quotes"),
            PipelineStage::CrossLinks => write!(f, "cross-links"),
            PipelineStage::Enrichment => write!(f, "enrichment"),
            PipelineStage::Report => write!(f, "report"),
            PipelineStage::Complete => write!(f, "complete"),
            PipelineStage::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineStatus {
    pub stage: PipelineStage,
    pub message: String,
    /// 0-100
    pub progress: u8,
}

impl PipelineStatus {
    pub fn new(stage: PipelineStage, message: impl Into<String>, progress: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: progress.min(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!(EntityRole::parse_loose("core"), EntityRole::Core);
        assert_eq!(EntityRole::parse_loose(" Supplier "), EntityRole::Supplier);
        assert_eq!(EntityRole::parse_loose("Hyperscaler"), EntityRole::Other);
    }

    #[test]
    fn relationship_type_parse_tolerates_spelling() {
        assert_eq!(
            RelationshipType::parse_loose("supply_chain"),
            Some(RelationshipType::SupplyChain)
        );
        assert_eq!(
            RelationshipType::parse_loose("Supply Chain"),
            Some(RelationshipType::SupplyChain)
        );
        assert_eq!(RelationshipType::parse_loose("Rivalry"), None);
    }

    #[test]
    fn relationship_serializes_with_wire_names() {
        let rel = Relationship {
            source: "nvidia".into(),
            target: "tsmc".into(),
            rel_type: RelationshipType::SupplyChain,
            description: None,
            materiality: None,
            dependency_direction: None,
            evidence_strength: None,
            is_key_relationship: Some(true),
            evidence_ids: vec![1],
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "SupplyChain");
        assert_eq!(json["sourceIds"][0], 1);
        assert_eq!(json["isKeyRelationship"], true);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn entity_skips_empty_optionals() {
        let entity = Entity::new("nvidia", "NVIDIA", EntityRole::Core);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["role"], "Core");
        assert!(json.get("ticker").is_none());
        assert!(json.get("keyThemes").is_none());
    }

    #[test]
    fn max_evidence_id_of_empty_graph_is_zero() {
        let graph = UnifiedGraph::default();
        assert_eq!(graph.max_evidence_id(), 0);
    }

    #[test]
    fn stage_serializes_kebab_case() {
        let status = PipelineStatus::new(PipelineStage::SeedAnalysis, "go", 140);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["stage"], "seed-analysis");
        assert_eq!(json["progress"], 100);
    }
}
