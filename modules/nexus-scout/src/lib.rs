pub mod expansion;
pub mod pipeline;
pub mod producer;
pub mod prompts;
pub mod quality_gate;
pub mod run_log;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
