pub mod completeness;
pub mod evidence;
pub mod merge;
pub mod payload;

pub use completeness::evaluate;
pub use evidence::{is_valid_citation_url, remap_response, LedgerOutcome};
pub use merge::{GraphAccumulator, LinkOutcome, MergeOptions, MergeStats, UpdatePolicy, QUOTE_FIELDS};
pub use payload::{ProducerPayload, RawCitation, RawEndpoint, RawEntity, RawLink};
