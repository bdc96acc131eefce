//! Expansion controller.
//!
//! Runs bounded rounds of ego-network extraction over a growing seed queue:
//!
//! ```text
//! Seeding -> Evaluating -> (Expanding -> Seeding)* -> Done
//! ```
//!
//! Each round fans the pending batch out concurrently through the quality
//! gate, merges the responses one at a time in dispatch order, then scores the
//! graph. The score and the frontier decide whether another round runs.

use std::collections::HashSet;

use anyhow::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nexus_common::{
    is_generic_name, normalize_id, CompletenessSnapshot, Config, NexusError, PipelineStage,
    PipelineStatus,
};
use nexus_graph::{completeness, GraphAccumulator, MergeOptions, MergeStats};

use crate::quality_gate::{call_with_quality_gate, GatePolicy};
use crate::run_log::EventKind;
use crate::traits::{Producer, ProducerRequest, ProgressSink};

// --- Constants ---

pub const DEFAULT_MAX_ROUNDS: usize = 2;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.72;
pub const DEFAULT_BATCH_SIZE: usize = 4;

const ROUND0_LAYER: &str = "seed";
const SEED_ANALYSIS_PROGRESS: u8 = 10;
const SEED_ANALYSIS_PROGRESS_SPAN: usize = 15;

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionLimits {
    pub max_rounds: usize,
    pub score_threshold: f64,
    pub batch_size: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl From<&Config> for ExpansionLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_rounds: config.max_rounds.max(1),
            score_threshold: config.score_threshold,
            batch_size: config.expansion_batch.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    Seeding,
    Evaluating,
    Expanding,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ScoreThreshold,
    RoundBudget,
    FrontierExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ScoreThreshold => write!(f, "score threshold reached"),
            StopReason::RoundBudget => write!(f, "round budget exhausted"),
            StopReason::FrontierExhausted => write!(f, "no new seeds to explore"),
        }
    }
}

/// One seed to dispatch, with the provenance label its entities inherit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTask {
    pub name: String,
    pub layer: Option<String>,
}

impl SeedTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExpansionOutcome {
    /// Rounds actually run, round 0 included.
    pub rounds: usize,
    pub stop_reason: StopReason,
    /// Display names of every dispatched seed, in dispatch order.
    pub processed: Vec<String>,
    /// Canonical ids of the seed entities, resolved through producer aliases.
    pub tracked_seeds: Vec<String>,
    pub snapshot: CompletenessSnapshot,
    pub merge: MergeStats,
    pub producer_calls: usize,
    pub producer_failures: usize,
}

// --- Controller ---

pub struct ExpansionController<'a> {
    producer: &'a dyn Producer,
    progress: &'a dyn ProgressSink,
    limits: ExpansionLimits,
    topic: String,
    state: ExpansionState,
    round: usize,
    pending: Vec<SeedTask>,
    /// Canonical ids of seeds that were dispatched.
    processed_ids: HashSet<String>,
    processed: Vec<String>,
    /// Seeds already retried through the under-covered fallback.
    retried_ids: HashSet<String>,
    tracked_seeds: Vec<String>,
    core_ids: HashSet<String>,
    snapshot: CompletenessSnapshot,
    merge: MergeStats,
    producer_calls: usize,
    producer_failures: usize,
}

impl<'a> ExpansionController<'a> {
    pub fn new(
        producer: &'a dyn Producer,
        progress: &'a dyn ProgressSink,
        limits: ExpansionLimits,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            producer,
            progress,
            limits,
            topic: topic.into(),
            state: ExpansionState::Seeding,
            round: 0,
            pending: Vec::new(),
            processed_ids: HashSet::new(),
            processed: Vec::new(),
            retried_ids: HashSet::new(),
            tracked_seeds: Vec::new(),
            core_ids: HashSet::new(),
            snapshot: CompletenessSnapshot::default(),
            merge: MergeStats::default(),
            producer_calls: 0,
            producer_failures: 0,
        }
    }

    pub fn state(&self) -> ExpansionState {
        self.state
    }

    /// Deduplicate by canonical id and drop collective or empty names.
    /// Surviving initial seeds are the ones promoted to `Core`.
    pub fn initial_batch(seeds: Vec<SeedTask>) -> Vec<SeedTask> {
        let mut seen = HashSet::new();
        seeds
            .into_iter()
            .filter_map(|mut task| {
                task.name = task.name.trim().to_string();
                let id = normalize_id(&task.name);
                if id.is_empty() || is_generic_name(&task.name) || !seen.insert(id) {
                    return None;
                }
                Some(task)
            })
            .collect()
    }

    /// Drive the state machine to `Done`.
    ///
    /// Fails only when round 0 leaves the graph without a single entity.
    pub async fn run(
        &mut self,
        acc: &mut GraphAccumulator,
        seeds: Vec<SeedTask>,
    ) -> Result<ExpansionOutcome> {
        self.pending = Self::initial_batch(seeds);
        self.core_ids = self.pending.iter().map(|t| normalize_id(&t.name)).collect();
        self.state = ExpansionState::Seeding;
        let mut stop_reason = StopReason::FrontierExhausted;

        loop {
            match self.state {
                ExpansionState::Seeding => {
                    self.run_round(acc).await;
                    if self.round == 0 && acc.entity_count() == 0 {
                        warn!("Round 0 produced no entities");
                        return Err(NexusError::NoGraphData.into());
                    }
                    self.state = ExpansionState::Evaluating;
                }
                ExpansionState::Evaluating => {
                    let tracked = self.resolved_seeds(acc);
                    self.snapshot = completeness::evaluate(acc.graph(), &tracked);
                    acc.set_completeness(self.snapshot.clone());
                    self.progress.graph_snapshot(acc.graph());
                    self.progress.record(EventKind::RoundScored {
                        round: self.round,
                        score: self.snapshot.score,
                        frontier: self.snapshot.frontier_entities.len(),
                        under_covered: self.snapshot.under_covered_entities.len(),
                    });
                    info!(
                        round = self.round,
                        score = format!("{:.3}", self.snapshot.score).as_str(),
                        entities = acc.entity_count(),
                        links = acc.graph().links.len(),
                        "Round scored"
                    );

                    if self.snapshot.score >= self.limits.score_threshold {
                        stop_reason = StopReason::ScoreThreshold;
                        self.state = ExpansionState::Done;
                    } else if self.round + 1 >= self.limits.max_rounds {
                        stop_reason = StopReason::RoundBudget;
                        self.state = ExpansionState::Done;
                    } else {
                        self.state = ExpansionState::Expanding;
                    }
                }
                ExpansionState::Expanding => {
                    let next_round = self.round + 1;
                    let batch = self.next_batch(acc, next_round);
                    if batch.is_empty() {
                        stop_reason = StopReason::FrontierExhausted;
                        self.state = ExpansionState::Done;
                        continue;
                    }
                    self.progress.record(EventKind::SeedsQueued {
                        round: next_round,
                        seeds: batch.iter().map(|t| t.name.clone()).collect(),
                        layer: batch[0].layer.clone().unwrap_or_default(),
                    });
                    info!(round = next_round, seeds = batch.len(), "Expanding frontier");
                    self.pending = batch;
                    self.round = next_round;
                    self.state = ExpansionState::Seeding;
                }
                ExpansionState::Done => break,
            }
        }

        self.progress.record(EventKind::ExpansionStopped {
            round: self.round,
            reason: stop_reason,
        });
        info!(rounds = self.round + 1, reason = %stop_reason, "Expansion finished");

        Ok(ExpansionOutcome {
            rounds: self.round + 1,
            stop_reason,
            processed: self.processed.clone(),
            tracked_seeds: self.resolved_seeds(acc),
            snapshot: self.snapshot.clone(),
            merge: self.merge,
            producer_calls: self.producer_calls,
            producer_failures: self.producer_failures,
        })
    }

    /// Dispatch the pending batch concurrently, then merge in dispatch order.
    async fn run_round(&mut self, acc: &mut GraphAccumulator) {
        let batch = std::mem::take(&mut self.pending);
        let span = SEED_ANALYSIS_PROGRESS_SPAN * self.round / self.limits.max_rounds.max(1);
        self.progress.status(&PipelineStatus::new(
            PipelineStage::SeedAnalysis,
            format!("Round {}: analyzing {} seed entities...", self.round, batch.len()),
            SEED_ANALYSIS_PROGRESS + span as u8,
        ));

        let requests: Vec<ProducerRequest> = batch
            .iter()
            .map(|task| ProducerRequest::EgoNetwork {
                seed: task.name.clone(),
                topic: self.topic.clone(),
                layer: task.layer.clone(),
            })
            .collect();
        let producer = self.producer;
        let progress = self.progress;
        let responses = join_all(
            requests
                .iter()
                .map(|req| call_with_quality_gate(producer, req, GatePolicy::EGO_NETWORK, progress)),
        )
        .await;

        for ((task, request), response) in batch.iter().zip(&requests).zip(responses) {
            self.producer_calls += response.attempts;
            self.producer_failures += response.failures;

            let layer = task.layer.clone().unwrap_or_else(|| ROUND0_LAYER.to_string());
            let options = MergeOptions::entities()
                .with_layer(layer)
                .with_core_ids(self.core_ids.iter().cloned());
            let stats = acc.merge_response(&response.payload, &options);
            self.merge.absorb(&stats);
            self.progress.record(EventKind::ResponseMerged {
                request: request.label(),
                entities_added: stats.entities_added,
                entities_merged: stats.entities_merged,
                links_added: stats.links_added,
                links_duplicate: stats.links_duplicate,
                links_rejected: stats.links_rejected,
                citations_added: stats.citations_added,
                citations_dropped: stats.citations_dropped,
            });
            self.progress.graph_snapshot(acc.graph());

            let id = normalize_id(&task.name);
            if self.processed_ids.insert(id.clone()) {
                self.processed.push(task.name.clone());
                self.tracked_seeds.push(id);
            }
        }
    }

    /// Seed ids as the graph knows them. A seed dispatched as "NVIDIA" may
    /// live under the producer's key `nvda`.
    fn resolved_seeds(&self, acc: &GraphAccumulator) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::with_capacity(self.tracked_seeds.len());
        for seed in &self.tracked_seeds {
            let id = acc.resolve_seed_id(seed);
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
        resolved
    }

    /// Frontier entities not yet processed or pending; failing that,
    /// under-covered seeds that have not had their one retry.
    fn next_batch(&mut self, acc: &GraphAccumulator, round: usize) -> Vec<SeedTask> {
        let pending: HashSet<String> = self
            .pending
            .iter()
            .flat_map(|t| [normalize_id(&t.name), acc.resolve_seed_id(&t.name)])
            .collect();
        let processed: HashSet<String> = self
            .processed_ids
            .iter()
            .flat_map(|id| [id.clone(), acc.resolve_seed_id(id)])
            .collect();
        let frontier_layer = format!("expansion-{round}:frontier");

        let frontier: Vec<SeedTask> = self
            .snapshot
            .frontier_entities
            .iter()
            .filter(|e| !processed.contains(&e.id) && !pending.contains(&e.id))
            .filter(|e| !is_generic_name(&e.name))
            .take(self.limits.batch_size)
            .map(|e| SeedTask::new(e.name.clone()).with_layer(frontier_layer.clone()))
            .collect();
        if !frontier.is_empty() {
            return frontier;
        }

        let retry_layer = format!("expansion-{round}:under-covered");
        let retries: Vec<SeedTask> = self
            .snapshot
            .under_covered_entities
            .iter()
            .filter(|name| {
                let id = normalize_id(name);
                !self.retried_ids.contains(&id) && !pending.contains(&id)
            })
            .take(self.limits.batch_size)
            .map(|name| SeedTask::new(name.clone()).with_layer(retry_layer.clone()))
            .collect();
        for task in &retries {
            self.retried_ids.insert(normalize_id(&task.name));
        }
        retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_batch_dedups_and_filters() {
        let batch = ExpansionController::initial_batch(vec![
            SeedTask::new("NVIDIA"),
            SeedTask::new(" nvidia inc. "),
            SeedTask::new("Cloud Providers"),
            SeedTask::new(""),
            SeedTask::new("TSMC").with_layer("foundry"),
        ]);
        let names: Vec<&str> = batch.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["NVIDIA", "TSMC"]);
        assert_eq!(batch[1].layer.as_deref(), Some("foundry"));
    }

    #[test]
    fn limits_from_config_never_zero() {
        let config = Config {
            llm_provider: nexus_common::LlmProvider::Worker,
            api_base: String::new(),
            proxy_token: String::new(),
            openai_api_key: String::new(),
            openai_base_url: None,
            llm_model: "m".into(),
            request_timeout_secs: 1,
            max_rounds: 0,
            score_threshold: 0.5,
            expansion_batch: 0,
        };
        let limits = ExpansionLimits::from(&config);
        assert_eq!(limits.max_rounds, 1);
        assert_eq!(limits.batch_size, 1);
        assert_eq!(limits.score_threshold, 0.5);
    }
}
