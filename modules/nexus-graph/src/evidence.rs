//! Evidence ledger: citation validation and per-response id remapping.
//!
//! Every producer numbers its citations from 1, so local ids collide across
//! responses. Each response is remapped on its own, right before it is merged:
//!
//! 1. keep citations with a numeric local id and an http/https URL,
//! 2. give each kept citation a fresh global id (`base + 1`, `base + 2`, ...),
//! 3. rewrite each relationship's evidence list through the local→global map,
//!    dropping ids that did not survive. A relationship left with no evidence
//!    is discarded.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use nexus_common::Evidence;

use crate::payload::{RawCitation, RawLink};

/// Syntactic check only: parses as a URL with an http/https scheme and a host.
/// Reachability is the producer's promise, not something verified here.
pub fn is_valid_citation_url(raw: &str) -> bool {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Whether a single citation record would be kept by the ledger.
pub fn is_usable_citation(citation: &RawCitation) -> bool {
    citation.id.is_some()
        && citation
            .url
            .as_deref()
            .is_some_and(is_valid_citation_url)
}

/// Local ids of the usable citations in one response.
pub fn usable_citation_ids(citations: &[RawCitation]) -> HashSet<u64> {
    citations
        .iter()
        .filter(|c| is_usable_citation(c))
        .filter_map(|c| c.id)
        .collect()
}

/// Result of remapping one producer response.
#[derive(Debug, Clone, Default)]
pub struct LedgerOutcome {
    /// Kept citations, already carrying global ids.
    pub citations: Vec<Evidence>,
    /// Relationships whose evidence lists now hold global ids. Never empty.
    pub links: Vec<RawLink>,
    pub dropped_citations: usize,
    pub dropped_links: usize,
}

/// Remap one response's citations and relationships into the global id space.
///
/// `base` is the highest evidence id already in the graph. A repeated local id
/// within one response is ambiguous, so only its first usable occurrence is
/// kept.
pub fn remap_response(base: u64, citations: &[RawCitation], links: &[RawLink]) -> LedgerOutcome {
    let mut outcome = LedgerOutcome::default();
    let mut local_to_global: HashMap<u64, u64> = HashMap::new();
    let mut counter = 0u64;

    for citation in citations {
        let (Some(local_id), Some(url)) = (citation.id, citation.url.as_deref()) else {
            outcome.dropped_citations += 1;
            continue;
        };
        if !is_valid_citation_url(url) || local_to_global.contains_key(&local_id) {
            debug!(local_id, url, "Dropping unusable citation");
            outcome.dropped_citations += 1;
            continue;
        }

        counter += 1;
        let global_id = base + counter;
        local_to_global.insert(local_id, global_id);
        outcome.citations.push(Evidence {
            id: global_id,
            title: citation.title.clone(),
            url: url.trim().to_string(),
            note: citation.note.clone(),
        });
    }

    for link in links {
        let mut remapped: Vec<u64> = Vec::with_capacity(link.evidence_ids.len());
        for local_id in &link.evidence_ids {
            if let Some(global_id) = local_to_global.get(local_id) {
                if !remapped.contains(global_id) {
                    remapped.push(*global_id);
                }
            }
        }

        if remapped.is_empty() {
            outcome.dropped_links += 1;
            continue;
        }

        let mut kept = link.clone();
        kept.evidence_ids = remapped;
        outcome.links.push(kept);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(id: Option<u64>, url: Option<&str>) -> RawCitation {
        RawCitation {
            id,
            title: "t".to_string(),
            url: url.map(str::to_string),
            note: None,
        }
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_citation_url("https://www.reuters.com/technology/x"));
        assert!(is_valid_citation_url("http://example.com"));
        assert!(is_valid_citation_url("  https://sec.gov/  "));
        assert!(!is_valid_citation_url("not-a-url"));
        assert!(!is_valid_citation_url("ftp://example.com/file"));
        assert!(!is_valid_citation_url("javascript:alert(1)"));
        assert!(!is_valid_citation_url(""));
    }

    #[test]
    fn ids_continue_from_base() {
        let citations = vec![
            citation(Some(1), Some("https://a.com")),
            citation(Some(2), Some("https://b.com")),
        ];
        let links = vec![RawLink::new("A", "B", "Partner", vec![2, 1])];
        let outcome = remap_response(10, &citations, &links);

        let ids: Vec<u64> = outcome.citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert_eq!(outcome.links[0].evidence_ids, vec![12, 11]);
    }

    #[test]
    fn invalid_citation_takes_its_links_with_it() {
        let citations = vec![citation(Some(1), Some("not-a-url"))];
        let links = vec![RawLink::new("NVIDIA", "TSMC", "SupplyChain", vec![1])];
        let outcome = remap_response(0, &citations, &links);

        assert!(outcome.citations.is_empty());
        assert!(outcome.links.is_empty());
        assert_eq!(outcome.dropped_citations, 1);
        assert_eq!(outcome.dropped_links, 1);
    }

    #[test]
    fn partially_backed_link_keeps_surviving_ids() {
        let citations = vec![
            citation(Some(1), Some("https://a.com")),
            citation(Some(2), None),
            citation(None, Some("https://c.com")),
        ];
        let links = vec![RawLink::new("A", "B", "Partner", vec![1, 2, 3])];
        let outcome = remap_response(0, &citations, &links);

        assert_eq!(outcome.citations.len(), 1);
        assert_eq!(outcome.dropped_citations, 2);
        assert_eq!(outcome.links[0].evidence_ids, vec![1]);
    }

    #[test]
    fn link_without_evidence_is_dropped() {
        let citations = vec![citation(Some(1), Some("https://a.com"))];
        let links = vec![RawLink::new("A", "B", "Partner", vec![])];
        let outcome = remap_response(0, &citations, &links);
        assert!(outcome.links.is_empty());
        assert_eq!(outcome.dropped_links, 1);
    }

    #[test]
    fn duplicate_local_id_keeps_first() {
        let citations = vec![
            citation(Some(1), Some("https://first.com")),
            citation(Some(1), Some("https://second.com")),
        ];
        let outcome = remap_response(0, &citations, &[]);
        assert_eq!(outcome.citations.len(), 1);
        assert_eq!(outcome.citations[0].url, "https://first.com");
    }

    #[test]
    fn usable_ids_match_ledger_rules() {
        let citations = vec![
            citation(Some(1), Some("https://a.com")),
            citation(Some(2), Some("mailto:x@y.com")),
            citation(None, Some("https://c.com")),
        ];
        let ids = usable_citation_ids(&citations);
        assert_eq!(ids, HashSet::from([1]));
    }
}
