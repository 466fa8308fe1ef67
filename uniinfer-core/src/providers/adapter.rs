//! Provider adapter trait
//!
//! Defines the capability contract every backend implements: one blocking
//! completion call and one streaming call, both speaking the common
//! protocol types. Adapters hold only construction-time configuration
//! (credentials, base URL, account id) and are otherwise stateless.

use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::error::{ProviderResult, UniInferError};
use async_trait::async_trait;
use futures::Stream;
use reqwest::{Client, ClientBuilder};
use std::pin::Pin;
use std::time::Duration;

/// A finite, non-restartable sequence of completion chunks.
///
/// Each item carries only the incremental content delta for that chunk.
/// Chunks arrive in transport order; dropping the stream releases the
/// underlying connection on every exit path.
pub type ChatStream =
    Pin<Box<dyn Stream<Item = ProviderResult<ChatCompletionResponse>> + Send + 'static>>;

/// Capability contract implemented once per backend.
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// The provider's registry name (e.g. "anthropic", "ollama")
    fn name(&self) -> &str;

    /// Perform one chat completion round trip.
    ///
    /// Fails with a provider-tagged [`UniInferError`] on non-2xx status,
    /// malformed response payloads, network timeouts, and authentication
    /// failures. On success the response carries `provider`, `model`,
    /// and a message whose role is always assistant.
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse>;

    /// Open a streaming completion.
    ///
    /// The returned stream ends cleanly at the backend's end-of-stream
    /// sentinel, skips malformed fragments, and never yields
    /// empty-content chunks.
    async fn stream_complete(&self, request: &ChatCompletionRequest)
        -> ProviderResult<ChatStream>;
}

/// Default total timeout for a provider round trip
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout applied to every provider client
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("uniinfer/", env!("CARGO_PKG_VERSION"));

/// Build the pooled HTTP client a provider adapter holds.
///
/// The same bounded timeout applies to streaming and non-streaming calls;
/// exceeding it surfaces as [`UniInferError::Timeout`] through the
/// adapters' error mapping.
pub(crate) fn build_http_client(timeout: Duration) -> ProviderResult<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .gzip(true)
        .build()
        .map_err(|e| UniInferError::Provider(format!("failed to build HTTP client: {e}")))
}
