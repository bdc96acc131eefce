use serde::Serialize;

use nexus_graph::MergeStats;

use crate::expansion::StopReason;

/// Stats from a graph build.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuildStats {
    pub rounds: usize,
    pub stop_reason: Option<StopReason>,
    pub seeds_processed: usize,
    pub producer_calls: usize,
    pub producer_failures: usize,
    pub entities: usize,
    pub relationships: usize,
    pub citations: usize,
    pub citations_dropped: usize,
    pub entities_rejected: usize,
    pub links_rejected: usize,
    pub links_duplicate: usize,
    pub quote_updates: usize,
    pub enrichment_updates: usize,
    pub cross_links_added: usize,
    pub final_score: f64,
}

impl BuildStats {
    pub fn absorb_merge(&mut self, merge: &MergeStats) {
        self.citations_dropped += merge.citations_dropped;
        self.entities_rejected += merge.entities_rejected;
        self.links_rejected += merge.links_rejected;
        self.links_duplicate += merge.links_duplicate;
    }
}

impl std::fmt::Display for BuildStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Graph Build Complete ===")?;
        writeln!(f, "Rounds:             {}", self.rounds)?;
        if let Some(reason) = self.stop_reason {
            writeln!(f, "Stopped because:    {reason}")?;
        }
        writeln!(f, "Seeds processed:    {}", self.seeds_processed)?;
        writeln!(f, "Producer calls:     {}", self.producer_calls)?;
        writeln!(f, "Producer failures:  {}", self.producer_failures)?;
        writeln!(f, "\nGraph:")?;
        writeln!(f, "  Entities:      {}", self.entities)?;
        writeln!(f, "  Relationships: {}", self.relationships)?;
        writeln!(f, "  Citations:     {}", self.citations)?;
        writeln!(f, "\nRejected:")?;
        writeln!(f, "  Citations:     {}", self.citations_dropped)?;
        writeln!(f, "  Entities:      {}", self.entities_rejected)?;
        writeln!(f, "  Relationships: {}", self.links_rejected)?;
        writeln!(f, "  Duplicates:    {}", self.links_duplicate)?;
        if self.quote_updates + self.enrichment_updates + self.cross_links_added > 0 {
            writeln!(f, "\nDownstream:")?;
            writeln!(f, "  Quote updates:      {}", self.quote_updates)?;
            writeln!(f, "  Enrichment updates: {}", self.enrichment_updates)?;
            writeln!(f, "  Cross-links added:  {}", self.cross_links_added)?;
        }
        writeln!(f, "\nCompleteness: {:.2}", self.final_score)?;
        Ok(())
    }
}
