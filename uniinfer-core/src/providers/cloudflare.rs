//! Cloudflare Workers AI provider implementation
//!
//! Workers AI is account-scoped: the model is part of the URL
//! (`/accounts/{account_id}/ai/run/{model}`, with the model's leading
//! `@` stripped) and the completion comes back under
//! `result.response`. Chat history is flattened into a single prompt
//! string. Streaming is SSE with `{"response": "..."}` deltas and a
//! `[DONE]` sentinel.

use crate::config::SecretString;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Message, MessageRole, Usage};
use crate::providers::adapter::{build_http_client, ChatProvider, ChatStream, DEFAULT_TIMEOUT};
use crate::providers::error::{map_request_error, map_status, ProviderResult, UniInferError};
use crate::streaming::{sse_stream, StreamDelta};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const CLOUDFLARE_DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

/// Adapter for Cloudflare Workers AI
#[derive(Debug)]
pub struct CloudflareProvider {
    api_key: SecretString,
    account_id: String,
    client: Client,
}

impl CloudflareProvider {
    /// Create an adapter for the given account.
    ///
    /// Fails with [`UniInferError::InvalidRequest`] when `account_id` is
    /// empty, since the account id is part of every endpoint URL.
    pub fn new(
        api_key: impl Into<SecretString>,
        account_id: impl Into<String>,
    ) -> ProviderResult<Self> {
        let account_id = account_id.into();
        if account_id.is_empty() {
            return Err(UniInferError::InvalidRequest(
                "cloudflare: account_id is required".to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.into(),
            account_id,
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id,
            model.trim_start_matches('@')
        )
    }

    /// Flatten the conversation into the prompt format Workers AI text
    /// models expect.
    fn build_prompt(messages: &[Message]) -> String {
        let mut lines = Vec::new();
        for message in messages {
            match message.role {
                MessageRole::System => lines.push(format!("System: {}", message.content)),
                MessageRole::User => lines.push(format!("User: {}", message.content)),
                MessageRole::Assistant => lines.push(format!("Assistant: {}", message.content)),
            }
        }
        lines.push("Assistant:".to_string());
        lines.join("\n")
    }

    fn request_body(&self, request: &ChatCompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "prompt": Self::build_prompt(&request.messages),
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn dispatch(&self, model: &str, body: &Value) -> ProviderResult<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(model))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|err| map_request_error("cloudflare", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status("cloudflare", status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for CloudflareProvider {
    fn name(&self) -> &str {
        "cloudflare"
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        request.validate()?;
        let model = request.model.as_deref().unwrap_or(CLOUDFLARE_DEFAULT_MODEL);
        debug!(model, "dispatching chat completion to cloudflare");

        let body = self.request_body(request, false);
        let response = self.dispatch(model, &body).await?;

        let raw: Value = response.json().await.map_err(|err| {
            UniInferError::Provider(format!("cloudflare: invalid JSON body: {err}"))
        })?;

        let content = raw
            .get("result")
            .and_then(|result| result.get("response"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                UniInferError::Provider(
                    "cloudflare: response carried no result.response field".to_string(),
                )
            })?
            .to_string();

        Ok(ChatCompletionResponse {
            message: Message::assistant(content),
            provider: "cloudflare".to_string(),
            model: model.to_string(),
            usage: Usage::default(),
            raw_response: raw,
        })
    }

    async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        request.validate()?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| CLOUDFLARE_DEFAULT_MODEL.to_string());
        debug!(model = %model, "opening completion stream to cloudflare");

        let body = self.request_body(request, true);
        let response = self.dispatch(&model, &body).await?;

        let bytes = futures::TryStreamExt::map_err(response.bytes_stream(), |err| {
            UniInferError::Provider(format!("cloudflare: stream transport error: {err}"))
        });

        Ok(sse_stream(
            bytes,
            "cloudflare".to_string(),
            Some(model),
            |value| {
                let text = value.get("response")?.as_str()?;
                if text.is_empty() {
                    return None;
                }
                Some(StreamDelta::text(text))
            },
        ))
    }
}
