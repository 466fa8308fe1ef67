//! Anthropic provider implementation
//!
//! Claude's API differs from the OpenAI wire family in every place an
//! adapter is allowed to differ: authentication uses `x-api-key` plus a
//! pinned `anthropic-version` header, system messages travel in a
//! top-level `system` field rather than the message list, completions
//! come back as content blocks, and streamed deltas arrive as
//! `content_block_delta` events with no `[DONE]` sentinel (the event
//! stream simply ends after `message_stop`).

use crate::config::SecretString;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Message, MessageRole, Usage};
use crate::providers::adapter::{build_http_client, ChatProvider, ChatStream, DEFAULT_TIMEOUT};
use crate::providers::error::{map_request_error, map_status, ProviderResult, UniInferError};
use crate::streaming::{sse_stream, StreamDelta};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Anthropic requires max_tokens; applied when the request names none
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter for Anthropic's Messages API
#[derive(Debug)]
pub struct AnthropicProvider {
    base_url: String,
    api_key: SecretString,
    client: Client,
}

impl AnthropicProvider {
    /// Create an adapter against api.anthropic.com
    pub fn new(api_key: impl Into<SecretString>) -> ProviderResult<Self> {
        Ok(Self {
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }

    /// Override the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn request_body(&self, request: &ChatCompletionRequest, stream: bool) -> Value {
        // System messages are lifted out of the conversation into the
        // top-level `system` field Anthropic expects.
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|message| message.role == MessageRole::System)
            .map(|message| message.content.as_str())
            .collect();
        let messages: Vec<&Message> = request
            .messages
            .iter()
            .filter(|message| message.role != MessageRole::System)
            .collect();

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(ANTHROPIC_DEFAULT_MODEL),
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn dispatch(&self, body: &Value) -> ProviderResult<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|err| map_request_error("anthropic", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status("anthropic", status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        request.validate()?;
        debug!(model = ?request.model, "dispatching chat completion to anthropic");

        let body = self.request_body(request, false);
        let response = self.dispatch(&body).await?;

        let raw: Value = response.json().await.map_err(|err| {
            UniInferError::Provider(format!("anthropic: invalid JSON body: {err}"))
        })?;

        let content = raw
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks.iter().find_map(|block| {
                    (block.get("type")?.as_str()? == "text")
                        .then(|| block.get("text")?.as_str().map(str::to_string))
                        .flatten()
                })
            })
            .ok_or_else(|| {
                UniInferError::Provider("anthropic: response carried no text content".to_string())
            })?;

        let usage = raw.get("usage").map(|usage| {
            let prompt_tokens =
                usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            let completion_tokens =
                usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
            Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }
        });

        Ok(ChatCompletionResponse {
            message: Message::assistant(content),
            provider: "anthropic".to_string(),
            model: raw
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| request.model.clone())
                .unwrap_or_else(|| ANTHROPIC_DEFAULT_MODEL.to_string()),
            usage: usage.unwrap_or_default(),
            raw_response: raw,
        })
    }

    async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        request.validate()?;
        debug!(model = ?request.model, "opening completion stream to anthropic");

        let body = self.request_body(request, true);
        let response = self.dispatch(&body).await?;

        let requested_model = Some(
            request
                .model
                .clone()
                .unwrap_or_else(|| ANTHROPIC_DEFAULT_MODEL.to_string()),
        );
        let bytes = futures::TryStreamExt::map_err(response.bytes_stream(), |err| {
            UniInferError::Provider(format!("anthropic: stream transport error: {err}"))
        });

        Ok(sse_stream(
            bytes,
            "anthropic".to_string(),
            requested_model,
            |value| {
                // Only content_block_delta events carry text; message_start,
                // ping, message_delta and message_stop yield nothing.
                if value.get("type")?.as_str()? != "content_block_delta" {
                    return None;
                }
                let text = value.get("delta")?.get("text")?.as_str()?;
                if text.is_empty() {
                    return None;
                }
                Some(StreamDelta::text(text))
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_lift_into_system_field() {
        let provider = AnthropicProvider::new("key").unwrap();
        let request = ChatCompletionRequest::new(vec![
            Message::system("Be concise."),
            Message::user("Hello"),
            Message::assistant("Hi."),
            Message::user("Bye"),
        ]);
        let body = provider.request_body(&request, false);
        assert_eq!(body["system"], "Be concise.");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn max_tokens_defaults_when_absent() {
        let provider = AnthropicProvider::new("key").unwrap();
        let request = ChatCompletionRequest::new(vec![Message::user("hi")]);
        let body = provider.request_body(&request, true);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["stream"], true);
        assert!(body.get("system").is_none());
    }
}
