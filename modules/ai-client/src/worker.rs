//! Relay worker backend.
//!
//! The relay keeps provider credentials server-side. It accepts a flat
//! `{model, systemInstruction, userContent, temperature}` body and answers
//! with `{content}`, an OpenAI-shaped `{choices: [{message: {content}}]}`,
//! or `{text}`. Errors come back as `{error}` with a non-2xx status.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::traits::{ChatModel, ChatRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    model: &'a str,
    system_instruction: &'a str,
    user_content: &'a str,
    temperature: f32,
}

#[derive(Clone)]
pub struct Worker {
    endpoint: String,
    token: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl Worker {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            token: None,
            model: model.into(),
            http,
        })
    }

    /// Bearer token the relay expects, if it is protected.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }
        Ok(headers)
    }
}

/// Pull the assistant text out of whichever body shape the relay returned.
fn extract_content(body: &Value) -> Option<String> {
    let content = body
        .get("content")
        .or_else(|| body.pointer("/choices/0/message/content"))
        .or_else(|| body.get("text"))?;
    match content {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ChatModel for Worker {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let model = request.model.as_deref().unwrap_or(self.model.as_str());
        let body = RelayRequest {
            model,
            system_instruction: &request.system,
            user_content: &request.user,
            temperature: request.temperature,
        };

        debug!(endpoint = %self.endpoint, model, "Relay worker request");

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: Option<Value> = response.json().await.ok();

        if !status.is_success() {
            let detail = parsed
                .as_ref()
                .and_then(|v| v.get("error"))
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("worker failed with status {status}"));
            return Err(anyhow!("Relay worker error ({}): {}", status, detail));
        }

        parsed
            .as_ref()
            .and_then(extract_content)
            .ok_or_else(|| anyhow!("Relay worker returned empty content"))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
