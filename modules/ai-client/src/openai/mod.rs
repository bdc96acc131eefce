mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::traits::{ChatModel, ChatRequest};
use client::OpenAiClient;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// OpenAi backend
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point at any OpenAI-compatible gateway (OpenRouter, a local server, ...).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self) -> Result<OpenAiClient> {
        let client = OpenAiClient::new(&self.api_key, self.timeout)?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAi {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let mut wire = types::ChatRequest::new(&model);
        for message in request.messages() {
            wire = wire.message(message);
        }

        if types::uses_max_completion_tokens(&model) {
            wire = wire.max_completion_tokens(8192);
        } else {
            wire = wire.max_tokens(8192).temperature(request.temperature);
        }

        self.client()?.chat(&wire).await
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
