//! Full graph build: input inference, bounded expansion, then the downstream
//! stages that decorate the expanded graph.
//!
//! ```text
//! inference -> seed-analysis (expansion rounds) -> quotes -> cross-links
//!           -> enrichment -> report -> complete
//! ```
//!
//! Only three conditions abort a build: an empty request, a topic from which
//! no seeds could be inferred, and an expansion that admitted no entities.
//! Every other producer failure degrades to a smaller graph.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use ai_client::util::parse_json_lenient;
use nexus_common::{
    AnalysisRequest, EntityRole, NexusError, PipelineStage, PipelineStatus, ResearchReport,
    UnifiedGraph,
};
use nexus_graph::{completeness, GraphAccumulator, MergeOptions, UpdatePolicy};

use crate::expansion::{ExpansionController, ExpansionLimits, SeedTask};
use crate::quality_gate::{call_with_quality_gate, GatePolicy};
use crate::run_log::EventKind;
use crate::stats::BuildStats;
use crate::traits::{EnrichTarget, NoopProgress, Producer, ProducerRequest, ProgressSink, ReportLink};

// --- Constants ---

pub const TOPIC_FALLBACK: &str = "General Industry Analysis";
pub const QUOTE_BATCH_SIZE: usize = 15;
pub const ENRICH_BATCH_SIZE: usize = 5;
/// Cross-link search needs more than this many entities to be worthwhile.
const CROSS_LINK_MIN_ENTITIES: usize = 2;
const CROSS_LINK_SIZE_BUCKETS: [&str; 3] = ["mega", "large", "mid"];

const PROGRESS_INFERENCE: u8 = 2;
const PROGRESS_QUOTES: u8 = 30;
const PROGRESS_CROSS_LINKS: u8 = 50;
const PROGRESS_ENRICHMENT: u8 = 75;
const PROGRESS_REPORT: u8 = 90;
const PROGRESS_COMPLETE: u8 = 100;

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Long-lived collaborators for a graph build.
#[derive(Clone, TypedBuilder)]
pub struct BuilderDeps {
    pub producer: Arc<dyn Producer>,
    #[builder(default = Arc::new(NoopProgress))]
    pub progress: Arc<dyn ProgressSink>,
    #[builder(default)]
    pub limits: ExpansionLimits,
}

pub struct BuildResult {
    pub graph: UnifiedGraph,
    pub topic: String,
    pub stats: BuildStats,
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

pub struct GraphBuilder {
    deps: BuilderDeps,
}

impl GraphBuilder {
    pub fn new(deps: BuilderDeps) -> Self {
        Self { deps }
    }

    fn status(&self, stage: PipelineStage, message: impl Into<String>, progress: u8) {
        self.deps
            .progress
            .status(&PipelineStatus::new(stage, message, progress));
    }

    /// Report the failure through the progress surface, then hand it back.
    fn fail(&self, error: NexusError) -> anyhow::Error {
        self.status(PipelineStage::Error, error.to_string(), 0);
        error.into()
    }

    pub async fn build(&self, request: &AnalysisRequest) -> Result<BuildResult> {
        let mut stats = BuildStats::default();
        let (topic, seeds) = self.resolve_inputs(request, &mut stats).await?;
        info!(topic = topic.as_str(), seeds = seeds.len(), "Starting graph build");

        // Expansion
        let producer = self.deps.producer.as_ref();
        let progress = self.deps.progress.as_ref();
        let mut acc = GraphAccumulator::new();
        let mut controller = ExpansionController::new(producer, progress, self.deps.limits, topic.clone());
        let outcome = match controller.run(&mut acc, seeds).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(match e.downcast::<NexusError>() {
                    Ok(nexus) => self.fail(nexus),
                    Err(other) => other,
                });
            }
        };
        stats.rounds = outcome.rounds;
        stats.stop_reason = Some(outcome.stop_reason);
        stats.seeds_processed = outcome.processed.len();
        stats.producer_calls += outcome.producer_calls;
        stats.producer_failures += outcome.producer_failures;
        stats.absorb_merge(&outcome.merge);

        self.quotes(&mut acc, &mut stats).await;
        self.cross_links(&mut acc, &topic, &mut stats).await;
        self.enrichment(&mut acc, &topic, &mut stats).await;
        self.report(&mut acc, &mut stats).await;

        let snapshot = completeness::evaluate(acc.graph(), &outcome.tracked_seeds);
        stats.final_score = snapshot.score;
        acc.set_completeness(snapshot);

        let graph = acc.into_graph();
        stats.entities = graph.nodes.len();
        stats.relationships = graph.links.len();
        stats.citations = graph.sources.len();

        self.status(PipelineStage::Complete, "Analysis complete", PROGRESS_COMPLETE);
        progress.graph_snapshot(&graph);
        info!(
            entities = stats.entities,
            relationships = stats.relationships,
            score = format!("{:.3}", stats.final_score).as_str(),
            "Graph build complete"
        );

        Ok(BuildResult { graph, topic, stats })
    }

    // --- Inference ---

    async fn resolve_inputs(
        &self,
        request: &AnalysisRequest,
        stats: &mut BuildStats,
    ) -> Result<(String, Vec<SeedTask>)> {
        let seeds: Vec<String> = request
            .seeds
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let topic = request
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        match (seeds.is_empty(), topic) {
            (true, None) => Err(self.fail(NexusError::EmptyRequest)),
            (false, Some(topic)) => Ok((topic, seeds.into_iter().map(SeedTask::new).collect())),
            (false, None) => {
                let topic = self.infer_topic(&seeds, stats).await;
                Ok((topic, seeds.into_iter().map(SeedTask::new).collect()))
            }
            (true, Some(topic)) => {
                let tasks = self.infer_seeds(&topic, stats).await;
                if tasks.is_empty() {
                    return Err(self.fail(NexusError::SeedInference(topic)));
                }
                Ok((topic, tasks))
            }
        }
    }

    async fn infer_topic(&self, seeds: &[String], stats: &mut BuildStats) -> String {
        self.status(PipelineStage::Inference, "Inferring analysis topic...", PROGRESS_INFERENCE);
        let request = ProducerRequest::InferTopic {
            seeds: seeds.to_vec(),
        };
        let topic = self
            .call_json(&request, stats)
            .await
            .and_then(|v| v.get("topic").and_then(Value::as_str).map(str::trim).map(str::to_string))
            .filter(|t| !t.is_empty());

        let topic = match topic {
            Some(topic) => topic,
            None => {
                warn!("Topic inference failed, using fallback topic");
                TOPIC_FALLBACK.to_string()
            }
        };
        self.deps.progress.topic_inferred(&topic);
        topic
    }

    async fn infer_seeds(&self, topic: &str, stats: &mut BuildStats) -> Vec<SeedTask> {
        self.status(
            PipelineStage::Inference,
            format!("Identifying seed entities for '{topic}'..."),
            PROGRESS_INFERENCE,
        );
        let request = ProducerRequest::InferSeeds {
            topic: topic.to_string(),
        };
        let tasks = self
            .call_json(&request, stats)
            .await
            .map(|v| parse_seed_tasks(&v))
            .unwrap_or_default();
        let tasks = ExpansionController::initial_batch(tasks);

        if !tasks.is_empty() {
            let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
            self.deps.progress.seeds_inferred(&names);
        }
        tasks
    }

    // --- Downstream stages ---

    async fn quotes(&self, acc: &mut GraphAccumulator, stats: &mut BuildStats) {
        self.status(PipelineStage::Quotes, "Fetching market data...", PROGRESS_QUOTES);
        let names: Vec<String> = acc.graph().nodes.iter().map(|n| n.name.clone()).collect();

        let mut updated = 0;
        for batch in names.chunks(QUOTE_BATCH_SIZE) {
            let request = ProducerRequest::Quotes {
                names: batch.to_vec(),
            };
            if let Some(updates) = self.call_updates(&request, stats).await {
                updated += acc.apply_updates(&updates, UpdatePolicy::Quote);
            }
        }

        stats.quote_updates += updated;
        self.deps.progress.record(EventKind::UpdatesApplied {
            stage: PipelineStage::Quotes,
            entities_updated: updated,
        });
        self.deps.progress.graph_snapshot(acc.graph());
        info!(entities_updated = updated, "Quote lookup finished");
    }

    async fn cross_links(&self, acc: &mut GraphAccumulator, topic: &str, stats: &mut BuildStats) {
        if acc.entity_count() <= CROSS_LINK_MIN_ENTITIES {
            self.status(
                PipelineStage::CrossLinks,
                "Too few entities for cross-link search, skipping",
                PROGRESS_CROSS_LINKS,
            );
            return;
        }
        self.status(
            PipelineStage::CrossLinks,
            "Searching for relationships between discovered entities...",
            PROGRESS_CROSS_LINKS,
        );

        let request = ProducerRequest::CrossLinks {
            names: cross_link_candidates(acc.graph()),
            topic: topic.to_string(),
        };
        let progress = self.deps.progress.as_ref();
        let response =
            call_with_quality_gate(self.deps.producer.as_ref(), &request, GatePolicy::CROSS_LINKS, progress).await;
        stats.producer_calls += response.attempts;
        stats.producer_failures += response.failures;

        let merged = acc.merge_response(&response.payload, &MergeOptions::links_only().key_relationships());
        stats.absorb_merge(&merged);
        stats.cross_links_added += merged.links_added;
        progress.record(EventKind::ResponseMerged {
            request: request.label(),
            entities_added: merged.entities_added,
            entities_merged: merged.entities_merged,
            links_added: merged.links_added,
            links_duplicate: merged.links_duplicate,
            links_rejected: merged.links_rejected,
            citations_added: merged.citations_added,
            citations_dropped: merged.citations_dropped,
        });
        progress.graph_snapshot(acc.graph());
        info!(links_added = merged.links_added, "Cross-link search finished");
    }

    async fn enrichment(&self, acc: &mut GraphAccumulator, topic: &str, stats: &mut BuildStats) {
        self.status(PipelineStage::Enrichment, "Enriching entity profiles...", PROGRESS_ENRICHMENT);
        let targets: Vec<EnrichTarget> = acc
            .graph()
            .nodes
            .iter()
            .map(|n| EnrichTarget {
                id: n.id.clone(),
                name: n.name.clone(),
                country: n.country.clone(),
                ticker: n.ticker.clone(),
                market_cap: n.market_cap.clone(),
                sector: n.sector.clone(),
            })
            .collect();

        let mut updated = 0;
        for batch in targets.chunks(ENRICH_BATCH_SIZE) {
            let request = ProducerRequest::Enrich {
                nodes: batch.to_vec(),
                topic: topic.to_string(),
            };
            if let Some(updates) = self.call_updates(&request, stats).await {
                updated += acc.apply_updates(&updates, UpdatePolicy::FillEmpty);
            }
        }

        stats.enrichment_updates += updated;
        self.deps.progress.record(EventKind::UpdatesApplied {
            stage: PipelineStage::Enrichment,
            entities_updated: updated,
        });
        self.deps.progress.graph_snapshot(acc.graph());
        info!(entities_updated = updated, "Enrichment finished");
    }

    async fn report(&self, acc: &mut GraphAccumulator, stats: &mut BuildStats) {
        self.status(PipelineStage::Report, "Writing research report...", PROGRESS_REPORT);
        let graph = acc.graph();
        let request = ProducerRequest::Report {
            nodes: graph.nodes.clone(),
            links: graph
                .links
                .iter()
                .map(|l| ReportLink {
                    source: l.source.clone(),
                    target: l.target.clone(),
                    rel_type: l.rel_type.to_string(),
                })
                .collect(),
        };

        let Some(value) = self.call_json(&request, stats).await else {
            return;
        };
        match serde_json::from_value::<ResearchReport>(value) {
            Ok(report) => {
                acc.set_report(report);
                self.deps.progress.graph_snapshot(acc.graph());
            }
            Err(e) => warn!(error = %e, "Report response did not match the expected shape"),
        }
    }

    // --- Producer helpers ---

    /// Single ungated call parsed leniently. Failures are logged and yield `None`.
    async fn call_json(&self, request: &ProducerRequest, stats: &mut BuildStats) -> Option<Value> {
        stats.producer_calls += 1;
        match self.deps.producer.produce(request).await {
            Ok(text) => {
                let parsed = parse_json_lenient(&text);
                if parsed.is_none() {
                    warn!(request = request.label().as_str(), "Unparsable producer response");
                }
                parsed
            }
            Err(e) => {
                stats.producer_failures += 1;
                warn!(request = request.label().as_str(), error = %e, "Producer call failed");
                None
            }
        }
    }

    /// The `updates` object of a quote or enrichment response.
    async fn call_updates(
        &self,
        request: &ProducerRequest,
        stats: &mut BuildStats,
    ) -> Option<Map<String, Value>> {
        let mut value = self.call_json(request, stats).await?;
        match value.get_mut("updates").map(Value::take) {
            Some(Value::Object(updates)) => Some(updates),
            _ => {
                warn!(request = request.label().as_str(), "Response has no updates object");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seed tasks from `{"layers": [{name, seeds}]}` or a flat `{"seeds": [...]}`.
pub fn parse_seed_tasks(value: &Value) -> Vec<SeedTask> {
    let names = |v: Option<&Value>| -> Vec<String> {
        v.and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().or_else(|| s.get("name").and_then(Value::as_str)))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    if let Some(layers) = value.get("layers").and_then(Value::as_array) {
        let tasks: Vec<SeedTask> = layers
            .iter()
            .flat_map(|layer| {
                let label = layer
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string);
                names(layer.get("seeds")).into_iter().map(move |name| {
                    let task = SeedTask::new(name);
                    match &label {
                        Some(label) => task.with_layer(label.clone()),
                        None => task,
                    }
                })
            })
            .collect();
        if !tasks.is_empty() {
            return tasks;
        }
    }
    names(value.get("seeds")).into_iter().map(SeedTask::new).collect()
}

/// Names worth a cross-link search: core entities and anything not known to
/// be small. Falls back to every entity when fewer than two qualify.
pub fn cross_link_candidates(graph: &UnifiedGraph) -> Vec<String> {
    let candidates: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| {
            n.role == EntityRole::Core
                || n.size_bucket.as_deref().map_or(true, |bucket| {
                    CROSS_LINK_SIZE_BUCKETS.contains(&bucket.trim().to_lowercase().as_str())
                })
        })
        .map(|n| n.name.clone())
        .collect();
    if candidates.len() < 2 {
        return graph.nodes.iter().map(|n| n.name.clone()).collect();
    }
    candidates
}
