use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// =============================================================================
// ChatRequest
// =============================================================================

/// One system instruction plus one user payload, the only shape the
/// graph producers need.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Overrides the backend's default model when set.
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.1,
            model: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

// =============================================================================
// ChatModel Trait
// =============================================================================

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the request and return the raw assistant text. Non-2xx responses
    /// and empty content are errors.
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Model used when a request does not override it.
    fn default_model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_low_temperature() {
        let req = ChatRequest::new("sys", "user");
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert!(req.model.is_none());
    }

    #[test]
    fn messages_are_system_then_user() {
        let req = ChatRequest::new("sys", "hello").temperature(0.3);
        let messages = req.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "hello");
    }
}
