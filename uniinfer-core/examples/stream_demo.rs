//! Streaming demo against a local Ollama instance
//!
//! Prints tokens as they arrive. Requires a running Ollama server
//! (default endpoint http://localhost:11434).
//!
//! Run with: cargo run --example stream_demo

use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use uniinfer_core::{ChatCompletionRequest, FallbackStrategy, Message, ProviderRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uniinfer_core=info".into()),
        )
        .init();

    let registry = Arc::new(ProviderRegistry::with_defaults());
    let strategy = FallbackStrategy::new(registry, vec!["ollama".to_string()]);

    let request = ChatCompletionRequest::new(vec![Message::user(
        "Write a haiku about network timeouts.",
    )])
    .with_streaming();

    let (mut stream, provider) = strategy.stream_complete(&request).await?;
    println!("Streaming from {provider}:\n");

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                print!("{}", chunk.message.content);
                std::io::stdout().flush()?;
            }
            Err(err) => {
                eprintln!("\nstream error: {err}");
                break;
            }
        }
    }
    println!();

    Ok(())
}
