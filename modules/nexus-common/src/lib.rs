pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::{Config, LlmProvider};
pub use error::NexusError;
pub use identity::{is_generic_name, normalize_id};
pub use types::*;
