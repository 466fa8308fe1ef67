//! Fallback routing demo
//!
//! Tries a chain of providers in priority order and prints which one
//! served the request along with its latency statistics. API keys are
//! resolved from `<PROVIDER>_API_KEY` environment variables.
//!
//! Run with: cargo run --example fallback_demo

use std::sync::Arc;
use uniinfer_core::{
    ChatCompletionRequest, EnvKeyResolver, FallbackStrategy, Message, ProviderRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uniinfer_core=debug".into()),
        )
        .init();

    let registry =
        Arc::new(ProviderRegistry::with_defaults().with_resolver(Arc::new(EnvKeyResolver)));

    let strategy = FallbackStrategy::new(
        registry,
        vec![
            "mistral".to_string(),
            "anthropic".to_string(),
            "openai".to_string(),
        ],
    )
    .with_max_retries(1);

    let request = ChatCompletionRequest::new(vec![
        Message::system("You are a helpful assistant that provides concise responses."),
        Message::user("Explain how machine learning differs from traditional programming."),
    ])
    .with_temperature(0.7)
    .with_max_tokens(150);

    println!("Attempting completion with fallback strategy...");
    match strategy.complete(&request).await {
        Ok((response, provider)) => {
            println!("\nResponse from: {provider}");
            println!("Model: {}", response.model);
            println!("Content: {}", response.message.content);
            println!("Usage: {:?}", response.usage);
        }
        Err(err) => {
            eprintln!("All providers failed: {err}");
        }
    }

    println!("\nProvider statistics:");
    for (name, stats) in strategy.stats() {
        println!(
            "  {name}: calls={} errors={} avg={:?}",
            stats.call_count, stats.error_count, stats.avg_latency
        );
    }

    Ok(())
}
