//! Provider abstraction layer
//!
//! The adapter contract, the error taxonomy, the registry/factory, and
//! the routing strategies, plus the concrete adapters enabled at build
//! time. Which providers exist is a compile-time configuration choice:
//! each adapter module sits behind a cargo feature and absent providers
//! are simply not registered.

pub mod adapter;
pub mod error;
pub mod registry;
pub mod strategy;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "cloudflare")]
pub mod cloudflare;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use adapter::{ChatProvider, ChatStream};
pub use error::{map_provider_error, map_status, ProviderResult, UniInferError};
pub use registry::{
    EnvKeyResolver, KeyResolver, ProviderCtor, ProviderParams, ProviderRegistry,
};
pub use strategy::{CostBasedStrategy, FallbackStrategy, ProviderStatsSnapshot};

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
#[cfg(feature = "cloudflare")]
pub use cloudflare::CloudflareProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAIProvider;

#[allow(unused_imports)]
use std::sync::Arc;

/// OpenAI-wire-compatible backends registered alongside the named
/// adapters: (registry name, base URL, default model).
#[cfg(feature = "openai-compat")]
const OPENAI_COMPAT_BACKENDS: &[(&str, &str, &str)] = &[
    ("mistral", "https://api.mistral.ai/v1", "mistral-small-latest"),
    (
        "openrouter",
        "https://openrouter.ai/api/v1",
        "moonshotai/moonlight-16b-a3b-instruct:free",
    ),
    (
        "arli",
        "https://api.arliai.com/v1",
        "Mistral-Nemo-12B-Instruct-2407",
    ),
    (
        "internlm",
        "https://chat.intern-ai.org.cn/api/v1",
        "internlm3-latest",
    ),
    ("stepfun", "https://api.stepfun.com/v1", "step-1-8k"),
    (
        "sambanova",
        "https://api.sambanova.ai/v1",
        "Meta-Llama-3.1-8B-Instruct",
    ),
    ("upstage", "https://api.upstage.ai/v1/solar", "solar-pro"),
    (
        "ngc",
        "https://integrate.api.nvidia.com/v1",
        "deepseek-ai/deepseek-r1-distill-llama-8b",
    ),
    ("groq", "https://api.groq.com/openai/v1", "llama-3.1-8b-instant"),
];

/// Register every provider enabled at build time into `registry`.
///
/// Called by [`ProviderRegistry::with_defaults`]; usable directly to
/// layer the built-ins onto a registry that already carries custom
/// registrations.
pub fn register_builtin(registry: &ProviderRegistry) {
    #[cfg(feature = "openai")]
    registry.register(
        "openai",
        true,
        Arc::new(|api_key, params| {
            let api_key = registry::require_key("openai", api_key)?;
            let mut provider = OpenAIProvider::new(api_key)?;
            if let Some(base_url) = &params.base_url {
                provider = provider.with_base_url(base_url);
            }
            Ok(Box::new(provider))
        }),
    );

    #[cfg(feature = "openai-compat")]
    for &(name, default_base_url, default_model) in OPENAI_COMPAT_BACKENDS {
        registry.register(
            name,
            true,
            Arc::new(move |api_key, params| {
                let api_key = registry::require_key(name, api_key)?;
                let base_url = params.base_url.as_deref().unwrap_or(default_base_url);
                let provider = OpenAIProvider::compatible(name, base_url, default_model, api_key)?;
                Ok(Box::new(provider))
            }),
        );
    }

    #[cfg(feature = "anthropic")]
    registry.register(
        "anthropic",
        true,
        Arc::new(|api_key, params| {
            let api_key = registry::require_key("anthropic", api_key)?;
            let mut provider = AnthropicProvider::new(api_key)?;
            if let Some(base_url) = &params.base_url {
                provider = provider.with_base_url(base_url);
            }
            Ok(Box::new(provider))
        }),
    );

    #[cfg(feature = "ollama")]
    registry.register(
        "ollama",
        false,
        Arc::new(|_api_key, params| {
            let provider = match &params.base_url {
                Some(base_url) => OllamaProvider::with_base_url(base_url)?,
                None => OllamaProvider::new()?,
            };
            Ok(Box::new(provider))
        }),
    );

    #[cfg(feature = "cloudflare")]
    registry.register(
        "cloudflare",
        true,
        Arc::new(|api_key, params| {
            let api_key = registry::require_key("cloudflare", api_key)?;
            let account_id = params.account_id.clone().ok_or_else(|| {
                UniInferError::InvalidRequest(
                    "cloudflare: account_id parameter is required".to_string(),
                )
            })?;
            Ok(Box::new(CloudflareProvider::new(api_key, account_id)?))
        }),
    );
}
