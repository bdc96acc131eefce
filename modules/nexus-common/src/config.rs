use std::env;

use tracing::info;

use crate::error::NexusError;

/// Which chat backend the producers talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Relay proxy that keeps provider credentials server-side.
    Worker,
    /// Any OpenAI-compatible endpoint, called directly.
    OpenAi,
}

impl std::str::FromStr for LlmProvider {
    type Err = NexusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worker" | "" => Ok(LlmProvider::Worker),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(NexusError::Config(format!(
                "NEXUS_LLM_PROVIDER must be 'worker' or 'openai', got '{other}'"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Producer backend
    pub llm_provider: LlmProvider,
    pub api_base: String,
    pub proxy_token: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub llm_model: String,
    pub request_timeout_secs: u64,

    // Expansion
    pub max_rounds: usize,
    pub score_threshold: f64,
    pub expansion_batch: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, NexusError> {
        let llm_provider: LlmProvider = env::var("NEXUS_LLM_PROVIDER")
            .unwrap_or_default()
            .parse()?;

        let openai_api_key = match llm_provider {
            LlmProvider::OpenAi => required_env("OPENAI_API_KEY")?,
            LlmProvider::Worker => env::var("OPENAI_API_KEY").unwrap_or_default(),
        };

        Ok(Self {
            llm_provider,
            api_base: env::var("NEXUS_API_BASE")
                .unwrap_or_else(|_| "http://localhost:8787/api/run".to_string()),
            proxy_token: env::var("NEXUS_PROXY_TOKEN").unwrap_or_default(),
            openai_api_key,
            openai_base_url: env::var("OPENAI_BASE_URL").ok().filter(|s| !s.is_empty()),
            llm_model: env::var("NEXUS_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            request_timeout_secs: parsed_env("NEXUS_REQUEST_TIMEOUT_SECS", 60)?,
            max_rounds: parsed_env("NEXUS_MAX_ROUNDS", 2)?,
            score_threshold: parsed_env("NEXUS_SCORE_THRESHOLD", 0.72)?,
            expansion_batch: parsed_env("NEXUS_EXPANSION_BATCH", 4)?,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            provider = ?self.llm_provider,
            api_base = self.api_base.as_str(),
            proxy_token = redact(&self.proxy_token),
            openai_api_key = redact(&self.openai_api_key),
            openai_base_url = self.openai_base_url.as_deref().unwrap_or("-"),
            model = self.llm_model.as_str(),
            request_timeout_secs = self.request_timeout_secs,
            max_rounds = self.max_rounds,
            score_threshold = self.score_threshold,
            expansion_batch = self.expansion_batch,
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> Result<String, NexusError> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| NexusError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, NexusError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| NexusError::Config(format!("{key} must be a number, got '{raw}'"))),
        _ => Ok(default),
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
