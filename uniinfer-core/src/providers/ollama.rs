//! Ollama provider implementation
//!
//! The worked example for the NDJSON wire family: a local backend with
//! no authentication, responses as single JSON objects, and streaming as
//! newline-delimited JSON objects where the final object carries
//! `"done": true`. Generation knobs nest under `options`.

use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Message, Usage};
use crate::providers::adapter::{build_http_client, ChatProvider, ChatStream, DEFAULT_TIMEOUT};
use crate::providers::error::{map_request_error, map_status, ProviderResult, UniInferError};
use crate::streaming::{ndjson_stream, StreamDelta};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "llama2";

/// Adapter for a local Ollama instance
#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    /// Create an adapter against the default local endpoint
    pub fn new() -> ProviderResult<Self> {
        Self::with_base_url(OLLAMA_BASE_URL)
    }

    /// Create an adapter against a specific Ollama endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> ProviderResult<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request_body(&self, request: &ChatCompletionRequest, stream: bool) -> Value {
        let mut options = json!({});
        if let Some(temperature) = request.temperature {
            options["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        json!({
            "model": request.model.as_deref().unwrap_or(OLLAMA_DEFAULT_MODEL),
            "messages": request.messages,
            "stream": stream,
            "options": options,
        })
    }

    async fn dispatch(&self, body: &Value) -> ProviderResult<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|err| map_request_error("ollama", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status("ollama", status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        request.validate()?;
        debug!(model = ?request.model, "dispatching chat completion to ollama");

        let body = self.request_body(request, false);
        let response = self.dispatch(&body).await?;

        let raw: Value = response
            .json()
            .await
            .map_err(|err| UniInferError::Provider(format!("ollama: invalid JSON body: {err}")))?;

        let content = raw
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                UniInferError::Provider("ollama: response carried no message content".to_string())
            })?
            .to_string();

        let prompt_tokens = raw
            .get("prompt_eval_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let completion_tokens = raw.get("eval_count").and_then(Value::as_u64).unwrap_or(0) as u32;

        Ok(ChatCompletionResponse {
            message: Message::assistant(content),
            provider: "ollama".to_string(),
            model: raw
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| request.model.clone())
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            raw_response: raw,
        })
    }

    async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        request.validate()?;
        debug!(model = ?request.model, "opening completion stream to ollama");

        let body = self.request_body(request, true);
        let response = self.dispatch(&body).await?;

        let requested_model = Some(
            request
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
        );
        let bytes = futures::TryStreamExt::map_err(response.bytes_stream(), |err| {
            UniInferError::Provider(format!("ollama: stream transport error: {err}"))
        });

        Ok(ndjson_stream(
            bytes,
            "ollama".to_string(),
            requested_model,
            |value| {
                let content = value.get("message")?.get("content")?.as_str()?;
                if content.is_empty() {
                    return None;
                }
                let mut delta = StreamDelta::text(content);
                delta.model = value
                    .get("model")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(delta)
            },
        ))
    }
}
