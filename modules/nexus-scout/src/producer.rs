use std::sync::Arc;
use std::time::Duration;

use ai_client::{ChatModel, ChatRequest};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use nexus_common::NexusError;

use crate::prompts::system_prompt;
use crate::traits::{Producer, ProducerKind, ProducerRequest};

const EXTRACTION_TEMPERATURE: f32 = 0.1;
const CREATIVE_TEMPERATURE: f32 = 0.3;

/// Producer backed by a chat-completion model.
///
/// Every call carries its own timeout; an elapsed timeout is an error, which
/// callers treat the same as an empty response.
pub struct LlmProducer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl LlmProducer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    fn temperature(kind: ProducerKind) -> f32 {
        match kind {
            ProducerKind::InferSeeds | ProducerKind::Report => CREATIVE_TEMPERATURE,
            _ => EXTRACTION_TEMPERATURE,
        }
    }
}

#[async_trait]
impl Producer for LlmProducer {
    async fn produce(&self, request: &ProducerRequest) -> Result<String> {
        let kind = request.kind();
        let chat = ChatRequest::new(system_prompt(kind), request.payload().to_string())
            .temperature(Self::temperature(kind));

        debug!(request = request.label().as_str(), model = self.model.default_model(), "Calling producer");
        match tokio::time::timeout(self.timeout, self.model.chat(chat)).await {
            Ok(result) => result.map_err(|e| NexusError::Producer(e.to_string()).into()),
            Err(_) => Err(anyhow!(NexusError::Producer(format!(
                "{} timed out after {}s",
                request.label(),
                self.timeout.as_secs()
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<ChatRequest>>,
        delay: Duration,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn chat(&self, request: ChatRequest) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            let user = request.user.clone();
            self.seen.lock().unwrap().push(request);
            Ok(user)
        }

        fn default_model(&self) -> &str {
            "echo"
        }
    }

    fn echo(delay: Duration) -> Arc<EchoModel> {
        Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            delay,
        })
    }

    #[tokio::test]
    async fn sends_payload_as_user_content() {
        let model = echo(Duration::ZERO);
        let producer = LlmProducer::new(model.clone(), Duration::from_secs(5));
        let request = ProducerRequest::InferSeeds {
            topic: "AI compute".into(),
        };

        let text = producer.produce(&request).await.unwrap();
        assert_eq!(text, "\"AI compute\"");

        let seen = model.seen.lock().unwrap();
        assert!((seen[0].temperature - CREATIVE_TEMPERATURE).abs() < f32::EPSILON);
        assert!(seen[0].system.contains("value-chain layers"));
    }

    #[tokio::test]
    async fn extraction_calls_use_low_temperature() {
        let model = echo(Duration::ZERO);
        let producer = LlmProducer::new(model.clone(), Duration::from_secs(5));
        let request = ProducerRequest::Quotes {
            names: vec!["NVIDIA".into()],
        };
        producer.produce(&request).await.unwrap();
        let seen = model.seen.lock().unwrap();
        assert!((seen[0].temperature - EXTRACTION_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn timeout_is_an_error() {
        let producer = LlmProducer::new(echo(Duration::from_millis(200)), Duration::from_millis(10));
        let request = ProducerRequest::InferTopic {
            seeds: vec!["NVIDIA".into()],
        };
        let err = producer.produce(&request).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
