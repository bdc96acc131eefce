//! Provider-agnostic chat completion client.
//!
//! Two backends implement [`ChatModel`]:
//! - [`openai::OpenAi`] talks to any OpenAI-compatible `/chat/completions` endpoint.
//! - [`worker::Worker`] talks to a relay proxy that accepts
//!   `{model, systemInstruction, userContent, temperature}` and answers with
//!   `{content}` (or an OpenAI-shaped body).

pub mod openai;
pub mod traits;
pub mod util;
pub mod worker;

pub use traits::{ChatModel, ChatRequest, Message, MessageRole};
