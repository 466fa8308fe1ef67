//! Caller-facing provider configuration
//!
//! A static table of per-provider defaults (display name, default model,
//! whether a key is needed, extra construction parameters) that CLIs and
//! other front-ends use to pick sensible defaults. The registry and the
//! adapters do not depend on this table to function.

mod secrets;

pub use secrets::SecretString;

use serde_json::{json, Value};
use std::collections::HashMap;

/// Static configuration for one provider, consumed by callers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Human-readable provider name
    pub display_name: &'static str,

    /// Model used when a request names none
    pub default_model: &'static str,

    /// Whether the provider requires an API key
    pub needs_api_key: bool,

    /// Extra construction parameters (base URL, account id, ...)
    pub extra_params: HashMap<&'static str, Value>,
}

impl ProviderConfig {
    fn new(display_name: &'static str, default_model: &'static str, needs_api_key: bool) -> Self {
        Self {
            display_name,
            default_model,
            needs_api_key,
            extra_params: HashMap::new(),
        }
    }

    fn with_param(mut self, key: &'static str, value: Value) -> Self {
        self.extra_params.insert(key, value);
        self
    }
}

/// The static provider configuration table.
pub fn provider_configs() -> HashMap<&'static str, ProviderConfig> {
    HashMap::from([
        (
            "mistral",
            ProviderConfig::new("Mistral AI", "mistral-small-latest", true),
        ),
        (
            "anthropic",
            ProviderConfig::new("Anthropic (Claude)", "claude-3-sonnet-20240229", true),
        ),
        ("openai", ProviderConfig::new("OpenAI", "gpt-3.5-turbo", true)),
        (
            "ollama",
            ProviderConfig::new("Ollama (Local)", "llama2", false)
                .with_param("base_url", json!("http://localhost:11434")),
        ),
        (
            "arli",
            ProviderConfig::new("ArliAI", "Mistral-Nemo-12B-Instruct-2407", true),
        ),
        (
            "openrouter",
            ProviderConfig::new(
                "OpenRouter",
                "moonshotai/moonlight-16b-a3b-instruct:free",
                true,
            ),
        ),
        (
            "internlm",
            ProviderConfig::new("InternLM", "internlm3-latest", true)
                .with_param("top_p", json!(0.9)),
        ),
        ("stepfun", ProviderConfig::new("StepFun AI", "step-1-8k", true)),
        (
            "sambanova",
            ProviderConfig::new("SambaNova", "Meta-Llama-3.1-8B-Instruct", true),
        ),
        ("upstage", ProviderConfig::new("Upstage AI", "solar-pro", true)),
        (
            "ngc",
            ProviderConfig::new(
                "NVIDIA GPU Cloud (NGC)",
                "deepseek-ai/deepseek-r1-distill-llama-8b",
                true,
            ),
        ),
        (
            "cloudflare",
            ProviderConfig::new(
                "Cloudflare Workers AI",
                "@cf/meta/llama-3.1-8b-instruct",
                true,
            )
            .with_param("account_id", json!("")),
        ),
        (
            "groq",
            ProviderConfig::new("Groq", "llama-3.1-8b-instant", true),
        ),
    ])
}

/// Static cost table (USD per 1000 tokens, blended) for
/// [`CostBasedStrategy`](crate::providers::CostBasedStrategy) callers.
///
/// These are coarse list prices, not metered accounting.
pub fn default_costs() -> HashMap<&'static str, f64> {
    HashMap::from([
        ("ollama", 0.0),
        ("groq", 0.05),
        ("openrouter", 0.1),
        ("cloudflare", 0.1),
        ("mistral", 0.2),
        ("sambanova", 0.2),
        ("upstage", 0.25),
        ("ngc", 0.3),
        ("internlm", 0.3),
        ("arli", 0.4),
        ("stepfun", 0.4),
        ("openai", 0.5),
        ("anthropic", 3.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_local_backend_keyless() {
        let configs = provider_configs();
        assert!(!configs["ollama"].needs_api_key);
        assert!(configs["openai"].needs_api_key);
    }

    #[test]
    fn ollama_carries_base_url_param() {
        let configs = provider_configs();
        assert_eq!(
            configs["ollama"].extra_params["base_url"],
            json!("http://localhost:11434")
        );
    }

    #[test]
    fn every_config_names_a_default_model() {
        for (name, config) in provider_configs() {
            assert!(!config.default_model.is_empty(), "{name} has no default model");
        }
    }

    #[test]
    fn cost_table_covers_configured_providers() {
        let costs = default_costs();
        for name in provider_configs().keys() {
            assert!(costs.contains_key(name), "{name} missing from cost table");
        }
    }
}
