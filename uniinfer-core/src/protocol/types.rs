//! Core protocol types for chat completions
//!
//! These are the provider-agnostic data carriers every adapter translates
//! to and from. The design prioritizes:
//! - Type safety through enums and strong typing
//! - A single response shape for both full responses and stream chunks
//! - Debuggability by carrying the provider's raw payload alongside the
//!   normalized fields

use crate::providers::error::UniInferError;
use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion request
///
/// Conversation ordering is caller-defined and preserved as-is; the
/// request performs no deduplication or reordering of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatCompletionRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Model identifier; the provider's default model is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature; the provider's default is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether the caller intends to stream the response
    #[serde(default)]
    pub streaming: bool,
}

impl ChatCompletionRequest {
    /// Create a new request from a list of messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the generation token limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Mark the request as streaming
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Client-side validation, performed before any network round trip.
    ///
    /// A request with zero messages is invalid and fails fast with
    /// [`UniInferError::InvalidRequest`].
    pub fn validate(&self) -> Result<(), UniInferError> {
        if self.messages.is_empty() {
            return Err(UniInferError::InvalidRequest(
                "request must contain at least one message".to_string(),
            ));
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(UniInferError::InvalidRequest(
                    "max_tokens must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Token usage reported by a provider
///
/// All-zero when the backend reports nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

/// A chat completion response, or one chunk of a streamed completion.
///
/// For stream chunks, `message.content` holds only the incremental delta
/// for that chunk; the caller owns concatenation. Usage is typically
/// all-zero for chunks except possibly the final one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// The generated message; `role` is always [`MessageRole::Assistant`]
    pub message: Message,

    /// Name of the provider that produced the response
    pub provider: String,

    /// Model that generated the response (the requested model when the
    /// backend echoes none)
    pub model: String,

    /// Token usage information
    pub usage: Usage,

    /// The provider's raw response payload, kept for debugging
    pub raw_response: serde_json::Value,
}
