// Trait seams for the graph builder.
//
// Producer: every external text generator behind one call. The LLM-backed
// implementation lives in `producer`; tests script canned answers through
// `testing::MockProducer`.
// ProgressSink: presentation callbacks (stage status, graph snapshots,
// inferred inputs) plus fine-grained run events for the run log.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use nexus_common::{PipelineStatus, UnifiedGraph};

use crate::run_log::EventKind;

// ---------------------------------------------------------------------------
// Producer requests
// ---------------------------------------------------------------------------

/// One entity as handed to the enrichment producer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichTarget {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

/// Endpoint/type-only view of a relationship for the report producer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProducerRequest {
    InferTopic { seeds: Vec<String> },
    InferSeeds { topic: String },
    EgoNetwork {
        seed: String,
        topic: String,
        layer: Option<String>,
    },
    CrossLinks { names: Vec<String>, topic: String },
    Quotes { names: Vec<String> },
    Enrich { nodes: Vec<EnrichTarget>, topic: String },
    Report {
        nodes: Vec<nexus_common::Entity>,
        links: Vec<ReportLink>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    InferTopic,
    InferSeeds,
    EgoNetwork,
    CrossLinks,
    Quotes,
    Enrich,
    Report,
}

impl std::fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerKind::InferTopic => write!(f, "infer_topic"),
            ProducerKind::InferSeeds => write!(f, "infer_seeds"),
            ProducerKind::EgoNetwork => write!(f, "ego_network"),
            ProducerKind::CrossLinks => write!(f, "cross_links"),
            ProducerKind::Quotes => write!(f, "quotes"),
            ProducerKind::Enrich => write!(f, "enrich"),
            ProducerKind::Report => write!(f, "report"),
        }
    }
}

impl ProducerRequest {
    pub fn kind(&self) -> ProducerKind {
        match self {
            ProducerRequest::InferTopic { .. } => ProducerKind::InferTopic,
            ProducerRequest::InferSeeds { .. } => ProducerKind::InferSeeds,
            ProducerRequest::EgoNetwork { .. } => ProducerKind::EgoNetwork,
            ProducerRequest::CrossLinks { .. } => ProducerKind::CrossLinks,
            ProducerRequest::Quotes { .. } => ProducerKind::Quotes,
            ProducerRequest::Enrich { .. } => ProducerKind::Enrich,
            ProducerRequest::Report { .. } => ProducerKind::Report,
        }
    }

    /// Short human label for logs: the seed for ego-network calls, the kind otherwise.
    pub fn label(&self) -> String {
        match self {
            ProducerRequest::EgoNetwork { seed, .. } => format!("ego_network:{seed}"),
            other => other.kind().to_string(),
        }
    }

    /// The JSON user payload the producer receives.
    pub fn payload(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            ProducerRequest::InferTopic { seeds } => json!(seeds),
            ProducerRequest::InferSeeds { topic } => json!(topic),
            ProducerRequest::EgoNetwork { seed, topic, layer } => match layer {
                Some(layer) => json!({ "seed": seed, "topic": topic, "layer": layer }),
                None => json!({ "seed": seed, "topic": topic }),
            },
            ProducerRequest::CrossLinks { names, topic } => json!({ "nodes": names, "topic": topic }),
            ProducerRequest::Quotes { names } => json!(names),
            ProducerRequest::Enrich { nodes, topic } => json!({ "nodes": nodes, "topic": topic }),
            ProducerRequest::Report { nodes, links } => json!({ "nodes": nodes, "links": links }),
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// An unreliable external text generator. The returned string should parse
/// as JSON but is never trusted to.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, request: &ProducerRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ProgressSink
// ---------------------------------------------------------------------------

pub trait ProgressSink: Send + Sync {
    fn status(&self, _status: &PipelineStatus) {}

    /// Called after every merge so a consumer can render partial progress.
    fn graph_snapshot(&self, _graph: &UnifiedGraph) {}

    fn topic_inferred(&self, _topic: &str) {}

    fn seeds_inferred(&self, _seeds: &[String]) {}

    /// Fine-grained run events (producer attempts, merges, round scores).
    fn record(&self, _event: EventKind) {}
}

/// Discards everything.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}
