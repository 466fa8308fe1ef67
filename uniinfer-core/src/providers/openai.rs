//! OpenAI provider implementation
//!
//! The worked example for the HTTP-JSON + SSE wire family: a POST with a
//! JSON body, responses under `choices[0].message`, and streaming as
//! `data: {...}` events terminated by `data: [DONE]`.
//!
//! Because so many backends speak this exact wire format, the same
//! adapter serves the compatible family (Mistral, OpenRouter, Groq, ...)
//! through [`OpenAIProvider::compatible`], differing only in name, base
//! URL, and default model.

use crate::config::SecretString;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Message, Usage};
use crate::providers::adapter::{build_http_client, ChatProvider, ChatStream, DEFAULT_TIMEOUT};
use crate::providers::error::{map_request_error, map_status, ProviderResult, UniInferError};
use crate::streaming::{sse_stream, StreamDelta};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Adapter for OpenAI and OpenAI-wire-compatible backends
#[derive(Debug)]
pub struct OpenAIProvider {
    name: String,
    base_url: String,
    default_model: String,
    api_key: SecretString,
    organization: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIProvider {
    /// Create an adapter against api.openai.com
    pub fn new(api_key: impl Into<SecretString>) -> ProviderResult<Self> {
        Self::compatible("openai", OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL, api_key)
    }

    /// Create an adapter for an OpenAI-wire-compatible backend.
    ///
    /// `name` tags responses and errors; `base_url` must point at the
    /// root under which `/chat/completions` lives.
    pub fn compatible(
        name: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        api_key: impl Into<SecretString>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            api_key: api_key.into(),
            organization: None,
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }

    /// Override the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the OpenAI organization header
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &ChatCompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.default_model),
            "messages": request.messages,
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

    async fn dispatch(&self, body: &Value) -> ProviderResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(body);
        if let Some(organization) = &self.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| map_request_error(&self.name, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(&self.name, status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        request.validate()?;
        debug!(provider = %self.name, model = ?request.model, "dispatching chat completion");

        let body = self.request_body(request, false);
        let response = self.dispatch(&body).await?;

        let raw: Value = response
            .json()
            .await
            .map_err(|err| UniInferError::Provider(format!("{}: invalid JSON body: {err}", self.name)))?;
        let wire: WireResponse = serde_json::from_value(raw.clone()).map_err(|err| {
            UniInferError::Provider(format!("{}: unexpected response shape: {err}", self.name))
        })?;

        let choice = wire.choices.into_iter().next().ok_or_else(|| {
            UniInferError::Provider(format!("{}: response contained no choices", self.name))
        })?;

        Ok(ChatCompletionResponse {
            // The role is pinned to assistant whatever label the backend
            // returned for the completion.
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            provider: self.name.clone(),
            model: wire
                .model
                .or_else(|| request.model.clone())
                .unwrap_or_else(|| self.default_model.clone()),
            usage: wire.usage.unwrap_or_default(),
            raw_response: raw,
        })
    }

    async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        request.validate()?;
        debug!(provider = %self.name, model = ?request.model, "opening completion stream");

        let body = self.request_body(request, true);
        let response = self.dispatch(&body).await?;

        let provider = self.name.clone();
        let requested_model = Some(
            request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
        );
        let tag = provider.clone();
        let bytes = futures::TryStreamExt::map_err(response.bytes_stream(), move |err| {
            UniInferError::Provider(format!("{tag}: stream transport error: {err}"))
        });

        Ok(sse_stream(bytes, provider, requested_model, |value| {
            let content = value
                .get("choices")?
                .get(0)?
                .get("delta")?
                .get("content")?
                .as_str()?;
            if content.is_empty() {
                return None;
            }
            let mut delta = StreamDelta::text(content);
            delta.model = value
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(delta)
        }))
    }
}
