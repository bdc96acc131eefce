//! Build run log: sequenced timeline of everything a graph build did.
//!
//! A run produces one JSON document with the run id, timings, final stats and
//! the event list. Events are appended from concurrent producer calls, so the
//! log sits behind a mutex and is shared by reference.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use nexus_common::{PipelineStage, PipelineStatus, UnifiedGraph};

use crate::expansion::StopReason;
use crate::pipeline::BuildResult;
use crate::stats::BuildStats;
use crate::traits::ProgressSink;

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    inner: Mutex<RunLogInner>,
}

#[derive(Default)]
struct RunLogInner {
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    StageChanged {
        stage: PipelineStage,
        message: String,
        progress: u8,
    },
    TopicInferred {
        topic: String,
    },
    SeedsInferred {
        seeds: Vec<String>,
    },
    ProducerAttempt {
        request: String,
        attempt: usize,
        valid_links: usize,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ResponseMerged {
        request: String,
        entities_added: usize,
        entities_merged: usize,
        links_added: usize,
        links_duplicate: usize,
        links_rejected: usize,
        citations_added: usize,
        citations_dropped: usize,
    },
    RoundScored {
        round: usize,
        score: f64,
        frontier: usize,
        under_covered: usize,
    },
    ExpansionStopped {
        round: usize,
        reason: StopReason,
    },
    SeedsQueued {
        round: usize,
        seeds: Vec<String>,
        layer: String,
    },
    UpdatesApplied {
        stage: PipelineStage,
        entities_updated: usize,
    },
    GraphSnapshot {
        nodes: usize,
        links: usize,
        sources: usize,
    },
}

impl RunLog {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            inner: Mutex::new(RunLogInner::default()),
        }
    }

    pub fn log(&self, kind: EventKind) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let seq = inner.seq;
        inner.events.push(RunEvent {
            seq,
            ts: Utc::now(),
            kind,
        });
        inner.seq += 1;
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .clone()
    }

    /// Serialize the run log and write it as pretty JSON.
    pub fn save_to_file(&self, path: &Path, stats: &BuildStats) -> Result<()> {
        self.write(path, stats, None)
    }

    /// Save the log whatever the build's outcome. A failed build is written
    /// with empty stats and its error message.
    pub fn save_outcome(&self, path: &Path, outcome: &Result<BuildResult>) -> Result<()> {
        match outcome {
            Ok(result) => self.write(path, &result.stats, None),
            Err(e) => self.write(path, &BuildStats::default(), Some(format!("{e:#}"))),
        }
    }

    fn write(&self, path: &Path, stats: &BuildStats, error: Option<String>) -> Result<()> {
        let events = self.events();
        let document = SerializedRun {
            run_id: &self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stats,
            error,
            events: &events,
        };
        std::fs::write(path, serde_json::to_string_pretty(&document)?)?;

        info!(run_id = %self.run_id, events = events.len(), path = %path.display(), "Run log saved");
        Ok(())
    }
}

impl ProgressSink for RunLog {
    fn status(&self, status: &PipelineStatus) {
        self.log(EventKind::StageChanged {
            stage: status.stage,
            message: status.message.clone(),
            progress: status.progress,
        });
    }

    fn graph_snapshot(&self, graph: &UnifiedGraph) {
        self.log(EventKind::GraphSnapshot {
            nodes: graph.nodes.len(),
            links: graph.links.len(),
            sources: graph.sources.len(),
        });
    }

    fn topic_inferred(&self, topic: &str) {
        self.log(EventKind::TopicInferred {
            topic: topic.to_string(),
        });
    }

    fn seeds_inferred(&self, seeds: &[String]) {
        self.log(EventKind::SeedsInferred {
            seeds: seeds.to_vec(),
        });
    }

    fn record(&self, event: EventKind) {
        self.log(event);
    }
}

// ---------------------------------------------------------------------------
// Serialization wrappers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRun<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    stats: &'a BuildStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    events: &'a [RunEvent],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_sequenced() {
        let log = RunLog::new("run-1");
        log.log(EventKind::TopicInferred {
            topic: "AI".into(),
        });
        log.status(&PipelineStatus::new(PipelineStage::Quotes, "quotes", 30));
        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 0);
        assert_eq!(events[1].seq, 1);
    }

    #[test]
    fn event_kind_is_flattened_with_type_tag() {
        let event = RunEvent {
            seq: 3,
            ts: Utc::now(),
            kind: EventKind::ExpansionStopped {
                round: 1,
                reason: StopReason::ScoreThreshold,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "expansion_stopped");
        assert_eq!(json["reason"], "score_threshold");
        assert_eq!(json["seq"], 3);
    }

    #[test]
    fn saves_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let log = RunLog::new("run-2");
        log.graph_snapshot(&UnifiedGraph::default());
        log.save_to_file(&path, &BuildStats::default()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["run_id"], "run-2");
        assert_eq!(saved["events"][0]["type"], "graph_snapshot");
        assert_eq!(saved["stats"]["rounds"], 0);
        assert!(saved.get("error").is_none());
    }

    #[test]
    fn failed_build_is_still_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        let log = RunLog::new("run-3");
        log.status(&PipelineStatus::new(PipelineStage::Error, "no data", 0));
        let outcome: Result<BuildResult> = Err(nexus_common::NexusError::NoGraphData.into());
        log.save_outcome(&path, &outcome).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(saved["error"].as_str().unwrap().starts_with("No graph data"));
        assert_eq!(saved["events"][0]["stage"], "error");
        assert_eq!(saved["stats"]["entities"], 0);
    }
}
