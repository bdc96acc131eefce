use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ai_client::openai::OpenAi;
use ai_client::worker::Worker;
use ai_client::ChatModel;
use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nexus_common::{AnalysisRequest, Config, LlmProvider};
use nexus_scout::expansion::ExpansionLimits;
use nexus_scout::pipeline::{BuilderDeps, GraphBuilder};
use nexus_scout::producer::LlmProducer;
use nexus_scout::run_log::RunLog;

#[derive(Parser)]
#[command(name = "nexus-scout", about = "Evidence-backed company relationship graph builder")]
struct Cli {
    /// Seed company; repeat for several
    #[arg(long = "seed")]
    seeds: Vec<String>,

    /// Analysis theme; inferred from the seeds when omitted
    #[arg(long)]
    topic: Option<String>,

    /// Write the graph JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Save the run log as JSON
    #[arg(long)]
    run_log: Option<PathBuf>,

    /// Override NEXUS_MAX_ROUNDS
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("nexus=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Nexus scout starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let model: Arc<dyn ChatModel> = match config.llm_provider {
        LlmProvider::Worker => Arc::new(
            Worker::with_timeout(&config.api_base, &config.llm_model, timeout)?
                .with_token(&config.proxy_token),
        ),
        LlmProvider::OpenAi => {
            let mut client =
                OpenAi::new(&config.openai_api_key, &config.llm_model).with_timeout(timeout);
            if let Some(ref base_url) = config.openai_base_url {
                client = client.with_base_url(base_url);
            }
            Arc::new(client)
        }
    };

    let mut limits = ExpansionLimits::from(&config);
    if let Some(max_rounds) = cli.max_rounds {
        limits.max_rounds = max_rounds.max(1);
    }

    let run_log = Arc::new(RunLog::new(uuid::Uuid::new_v4().to_string()));
    let deps = BuilderDeps::builder()
        .producer(Arc::new(LlmProducer::new(model, timeout)))
        .progress(run_log.clone())
        .limits(limits)
        .build();

    let request = AnalysisRequest {
        seeds: cli.seeds,
        topic: cli.topic,
    };
    let built = GraphBuilder::new(deps).build(&request).await;
    if let Some(ref path) = cli.run_log {
        run_log.save_outcome(path, &built)?;
    }
    let result = built?;

    let json = serde_json::to_string_pretty(&result.graph)?;
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "Graph written");
        }
        None => println!("{json}"),
    }

    info!(topic = result.topic.as_str(), "{}", result.stats);
    Ok(())
}
