use thiserror::Error;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Producer error: {0}")]
    Producer(String),

    #[error("No graph data returned from producers. Check the relay endpoint and model access.")]
    NoGraphData,

    #[error("Nothing to analyze: provide at least one seed entity or a topic")]
    EmptyRequest,

    #[error("Could not infer seed entities from topic '{0}'. Provide at least one seed entity.")]
    SeedInference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
