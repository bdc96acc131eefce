// Test mocks for the graph builder.
//
// Two mocks matching the two trait boundaries:
// - MockProducer (Producer): canned responses per request kind or per seed,
//   consumed one per attempt, with every call recorded
// - RecordingProgress (ProgressSink): keeps everything it is told
//
// Plus JSON helpers for building producer responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use nexus_common::{PipelineStage, PipelineStatus, UnifiedGraph};

use crate::run_log::EventKind;
use crate::traits::{Producer, ProducerKind, ProducerRequest, ProgressSink};

// ---------------------------------------------------------------------------
// MockProducer
// ---------------------------------------------------------------------------

/// One scripted answer: text on success, message on failure.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Fail(String),
}

/// Scripted producer. Ego-network requests look up their seed first, every
/// request then falls back to its kind, then to the default. Each key holds a
/// queue; the last entry repeats once the queue is drained. Unscripted
/// requests return `Err`.
///
/// Builder pattern: `.on_seed()`, `.on_kind()`, `.fail_kind()`, `.with_default()`.
pub struct MockProducer {
    by_seed: Mutex<HashMap<String, VecDeque<Scripted>>>,
    by_kind: Mutex<HashMap<ProducerKind, VecDeque<Scripted>>>,
    default: Option<String>,
    calls: Mutex<Vec<ProducerRequest>>,
}

impl MockProducer {
    pub fn new() -> Self {
        Self {
            by_seed: Mutex::new(HashMap::new()),
            by_kind: Mutex::new(HashMap::new()),
            default: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one ego-network answer for `seed` (matched case-insensitively).
    pub fn on_seed(self, seed: &str, response: Value) -> Self {
        self.push_seed(seed, Scripted::Text(response.to_string()));
        self
    }

    pub fn on_seed_text(self, seed: &str, text: &str) -> Self {
        self.push_seed(seed, Scripted::Text(text.to_string()));
        self
    }

    pub fn fail_seed(self, seed: &str) -> Self {
        self.push_seed(seed, Scripted::Fail(format!("scripted failure for {seed}")));
        self
    }

    /// Queue one answer for every request of `kind`.
    pub fn on_kind(self, kind: ProducerKind, response: Value) -> Self {
        self.push_kind(kind, Scripted::Text(response.to_string()));
        self
    }

    pub fn fail_kind(self, kind: ProducerKind) -> Self {
        self.push_kind(kind, Scripted::Fail(format!("scripted failure for {kind}")));
        self
    }

    pub fn with_default(mut self, response: Value) -> Self {
        self.default = Some(response.to_string());
        self
    }

    /// Every request received, in call order.
    pub fn calls(&self) -> Vec<ProducerRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: ProducerKind) -> Vec<ProducerRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.kind() == kind)
            .collect()
    }

    /// Seeds of ego-network calls, in call order, repeats included.
    pub fn seeds_called(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r {
                ProducerRequest::EgoNetwork { seed, .. } => Some(seed),
                _ => None,
            })
            .collect()
    }

    fn push_seed(&self, seed: &str, scripted: Scripted) {
        self.by_seed
            .lock()
            .unwrap()
            .entry(seed.to_lowercase())
            .or_default()
            .push_back(scripted);
    }

    fn push_kind(&self, kind: ProducerKind, scripted: Scripted) {
        self.by_kind
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(scripted);
    }

    fn next_from<K: std::hash::Hash + Eq>(
        map: &Mutex<HashMap<K, VecDeque<Scripted>>>,
        key: &K,
    ) -> Option<Scripted> {
        let mut map = map.lock().unwrap();
        let queue = map.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Producer for MockProducer {
    async fn produce(&self, request: &ProducerRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let scripted = match request {
            ProducerRequest::EgoNetwork { seed, .. } => {
                Self::next_from(&self.by_seed, &seed.to_lowercase())
            }
            _ => None,
        }
        .or_else(|| Self::next_from(&self.by_kind, &request.kind()));

        match scripted {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Fail(message)) => bail!(message),
            None => match &self.default {
                Some(text) => Ok(text.clone()),
                None => bail!("MockProducer: nothing scripted for {}", request.label()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingProgress
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingProgress {
    statuses: Mutex<Vec<PipelineStatus>>,
    snapshots: Mutex<Vec<UnifiedGraph>>,
    topics: Mutex<Vec<String>>,
    seeds: Mutex<Vec<Vec<String>>>,
    events: Mutex<Vec<EventKind>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<PipelineStatus> {
        self.statuses.lock().unwrap().clone()
    }

    /// Stages in the order they were first announced.
    pub fn stages(&self) -> Vec<PipelineStage> {
        let mut stages = Vec::new();
        for status in self.statuses() {
            if stages.last() != Some(&status.stage) {
                stages.push(status.stage);
            }
        }
        stages
    }

    pub fn snapshots(&self) -> Vec<UnifiedGraph> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }

    pub fn inferred_seeds(&self) -> Vec<Vec<String>> {
        self.seeds.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn status(&self, status: &PipelineStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn graph_snapshot(&self, graph: &UnifiedGraph) {
        self.snapshots.lock().unwrap().push(graph.clone());
    }

    fn topic_inferred(&self, topic: &str) {
        self.topics.lock().unwrap().push(topic.to_string());
    }

    fn seeds_inferred(&self, seeds: &[String]) {
        self.seeds.lock().unwrap().push(seeds.to_vec());
    }

    fn record(&self, event: EventKind) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// A relationship citing citation `source_id`.
pub fn link(source: &str, target: &str, rel_type: &str, source_id: u64) -> Value {
    json!({"source": source, "target": target, "type": rel_type, "sourceIds": [source_id]})
}

pub fn node(name: &str, role: &str) -> Value {
    json!({"id": name, "name": name, "role": role})
}

pub fn citation(id: u64, url: &str) -> Value {
    json!({"id": id, "title": format!("Source {id}"), "url": url})
}

/// Ego-network response: `seed` as Core plus one supplier relationship to
/// each partner, every relationship backed by its own valid citation.
pub fn ego_response(seed: &str, partners: &[&str]) -> Value {
    let mut nodes = vec![node(seed, "Core")];
    let mut links = Vec::new();
    let mut sources = Vec::new();
    for (i, partner) in partners.iter().enumerate() {
        let id = i as u64 + 1;
        nodes.push(node(partner, "Supplier"));
        links.push(link(partner, seed, "SupplyChain", id));
        sources.push(citation(id, &format!("https://news.example.com/{id}")));
    }
    json!({"nodes": nodes, "links": links, "sources": sources})
}

/// `n` distinct relationships between placeholder names, all evidenced.
/// Only useful for scoring: the endpoints are not real entities.
pub fn scored_response(n: usize) -> Value {
    let links: Vec<Value> = (0..n)
        .map(|i| link(&format!("S{i}"), &format!("T{i}"), "Partner", 1))
        .collect();
    json!({"links": links, "sources": [citation(1, "https://ok.example.com")]})
}
