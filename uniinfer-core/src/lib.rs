//! UniInfer Core Library
//!
//! A unified chat-completion interface over heterogeneous remote LLM
//! inference providers. One provider-agnostic request model, one adapter
//! contract implemented per backend, a registry that instantiates
//! adapters and resolves credentials, and routing strategies that fall
//! back across providers in priority order.
//!
//! ```no_run
//! use std::sync::Arc;
//! use uniinfer_core::{ChatCompletionRequest, FallbackStrategy, Message, ProviderRegistry};
//!
//! # async fn run() -> Result<(), uniinfer_core::UniInferError> {
//! let registry = Arc::new(ProviderRegistry::with_defaults());
//! let strategy = FallbackStrategy::new(
//!     registry,
//!     vec!["mistral".to_string(), "anthropic".to_string(), "openai".to_string()],
//! );
//!
//! let request = ChatCompletionRequest::new(vec![Message::user("What is a monad?")])
//!     .with_temperature(0.7)
//!     .with_max_tokens(200);
//!
//! let (response, provider) = strategy.complete(&request).await?;
//! println!("[{provider}] {}", response.message.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod protocol;
pub mod providers;
pub mod streaming;

pub use config::{default_costs, provider_configs, ProviderConfig, SecretString};
pub use protocol::{ChatCompletionRequest, ChatCompletionResponse, Message, MessageRole, Usage};
pub use providers::{
    map_provider_error, ChatProvider, ChatStream, CostBasedStrategy, EnvKeyResolver,
    FallbackStrategy, KeyResolver, ProviderParams, ProviderRegistry, ProviderResult,
    ProviderStatsSnapshot, UniInferError,
};

/// Returns the version of the UniInfer core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
