//! Common protocol types shared by every provider adapter.

pub mod types;

pub use types::{ChatCompletionRequest, ChatCompletionResponse, Message, MessageRole, Usage};
