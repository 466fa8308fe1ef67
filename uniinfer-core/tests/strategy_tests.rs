//! Tests for the fallback and cost-based routing strategies
//!
//! Providers here are scripted: they fail a configured number of times
//! and then succeed, so the tests can drive every branch of the provider
//! loop without network I/O.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uniinfer_core::providers::adapter::ChatStream;
use uniinfer_core::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, CostBasedStrategy,
    FallbackStrategy, Message, ProviderRegistry, ProviderResult, UniInferError, Usage,
};

#[derive(Debug)]
struct ScriptedProvider {
    name: &'static str,
    remaining_failures: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn should_fail(&self) -> bool {
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }

    fn response(&self) -> ChatCompletionResponse {
        ChatCompletionResponse {
            message: Message::assistant(format!("answer from {}", self.name)),
            provider: self.name.to_string(),
            model: "scripted-model".to_string(),
            usage: Usage::default(),
            raw_response: serde_json::json!({}),
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        request.validate()?;
        if self.should_fail() {
            return Err(UniInferError::Provider(format!(
                "scripted failure from {}",
                self.name
            )));
        }
        Ok(self.response())
    }

    async fn stream_complete(&self, request: &ChatCompletionRequest) -> ProviderResult<ChatStream> {
        request.validate()?;
        if self.should_fail() {
            return Err(UniInferError::Provider(format!(
                "scripted failure from {}",
                self.name
            )));
        }
        let chunks = vec![Ok(self.response()), Ok(self.response())];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Register a provider that fails `failures` times before succeeding.
/// `usize::MAX` means it never succeeds.
fn register_scripted(
    registry: &ProviderRegistry,
    name: &'static str,
    failures: usize,
) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(failures));
    let handle = Arc::clone(&counter);
    registry.register(
        name,
        false,
        Arc::new(move |_api_key, _params| {
            Ok(Box::new(ScriptedProvider {
                name,
                remaining_failures: Arc::clone(&handle),
            }))
        }),
    );
    counter
}

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new(vec![Message::user("hello")])
}

#[tokio::test]
async fn first_healthy_provider_wins() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", usize::MAX);
    register_scripted(&registry, "p2", usize::MAX);
    register_scripted(&registry, "p3", 0);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string(), "p3".to_string()],
    );

    let (response, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "p3");
    assert_eq!(response.provider, "p3");
    assert_eq!(response.message.content, "answer from p3");

    let stats = strategy.stats();
    assert_eq!(stats["p1"].error_count, 1);
    assert_eq!(stats["p2"].error_count, 1);
    assert_eq!(stats["p3"].error_count, 0);
    assert_eq!(stats["p3"].call_count, 1);
    assert!(stats["p3"].avg_latency.is_some());
    assert!(stats["p3"].min_latency.is_some());
}

#[tokio::test]
async fn success_short_circuits_remaining_providers() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", 0);
    let p2_failures = register_scripted(&registry, "p2", 3);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string()],
    );

    let (_, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "p1");

    // p2 was never dispatched: its failure budget is untouched.
    assert_eq!(p2_failures.load(Ordering::SeqCst), 3);
    assert_eq!(strategy.stats()["p2"].call_count, 0);
}

#[tokio::test]
async fn exhaustion_raises_aggregate_error() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", usize::MAX);
    register_scripted(&registry, "p2", usize::MAX);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string()],
    );

    let err = strategy.complete(&request()).await.unwrap_err();
    match err {
        UniInferError::AllProvidersFailed { last_error } => {
            assert!(last_error.contains("scripted failure from p2"));
        }
        other => panic!("expected AllProvidersFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn default_retries_try_each_provider_once() {
    let registry = Arc::new(ProviderRegistry::new());
    // p1 would succeed on its second attempt, but the default gives it
    // only one.
    register_scripted(&registry, "p1", 1);
    register_scripted(&registry, "p2", 0);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string()],
    );

    let (_, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "p2");
    assert_eq!(strategy.stats()["p1"].call_count, 1);
}

#[tokio::test]
async fn max_retries_re_attempts_before_moving_on() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", 1);
    register_scripted(&registry, "p2", 0);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string()],
    )
    .with_max_retries(1);

    let (_, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "p1");

    let stats = strategy.stats();
    assert_eq!(stats["p1"].call_count, 2);
    assert_eq!(stats["p1"].error_count, 1);
}

#[tokio::test]
async fn unregistered_provider_is_skipped_not_fatal() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p2", 0);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["ghost".to_string(), "p2".to_string()],
    );

    let (_, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "p2");
    assert_eq!(strategy.stats()["ghost"].error_count, 1);
}

#[tokio::test]
async fn empty_request_fails_fast_without_dispatch() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", 0);

    let strategy = FallbackStrategy::new(Arc::clone(&registry), vec!["p1".to_string()]);

    let err = strategy
        .complete(&ChatCompletionRequest::new(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, UniInferError::InvalidRequest(_)));
    assert_eq!(strategy.stats()["p1"].call_count, 0);
}

#[tokio::test]
async fn latency_window_caps_at_ten_samples() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", 0);

    let strategy = FallbackStrategy::new(Arc::clone(&registry), vec!["p1".to_string()]);

    for _ in 0..15 {
        strategy.complete(&request()).await.unwrap();
    }

    let stats = strategy.stats();
    assert_eq!(stats["p1"].call_count, 15);
    // The window retains the 10 most recent samples; the derived figures
    // stay consistent with one another.
    let snapshot = &stats["p1"];
    assert!(snapshot.min_latency.unwrap() <= snapshot.avg_latency.unwrap());
    assert!(snapshot.avg_latency.unwrap() <= snapshot.max_latency.unwrap());
}

#[tokio::test]
async fn stream_fallback_returns_open_stream_and_provider() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "p1", usize::MAX);
    register_scripted(&registry, "p2", 0);

    let strategy = FallbackStrategy::new(
        Arc::clone(&registry),
        vec!["p1".to_string(), "p2".to_string()],
    );

    let (stream, provider) = strategy.stream_complete(&request()).await.unwrap();
    assert_eq!(provider, "p2");

    let chunks: Vec<_> = stream.collect().await;
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|chunk| chunk.is_ok()));

    let stats = strategy.stats();
    assert_eq!(stats["p1"].error_count, 1);
    assert_eq!(stats["p2"].call_count, 1);
    // Streaming success records no latency sample.
    assert_eq!(stats["p2"].avg_latency, None);
}

#[tokio::test]
async fn cost_strategy_orders_cheapest_first() {
    let registry = Arc::new(ProviderRegistry::new());
    let costs = std::collections::HashMap::from([
        ("a".to_string(), 2.0),
        ("b".to_string(), 0.5),
        ("c".to_string(), 1.0),
    ]);
    let strategy = CostBasedStrategy::new(Arc::clone(&registry), &costs);
    assert_eq!(strategy.provider_order(), ["b", "c", "a"]);
}

#[tokio::test]
async fn cost_strategy_delegates_to_fallback() {
    let registry = Arc::new(ProviderRegistry::new());
    register_scripted(&registry, "a", 0);
    register_scripted(&registry, "b", usize::MAX);
    register_scripted(&registry, "c", 0);

    let costs = std::collections::HashMap::from([
        ("a".to_string(), 2.0),
        ("b".to_string(), 0.5),
        ("c".to_string(), 1.0),
    ]);
    let strategy = CostBasedStrategy::new(Arc::clone(&registry), &costs);

    // Cheapest (b) fails, next-cheapest (c) serves the request.
    let (_, provider) = strategy.complete(&request()).await.unwrap();
    assert_eq!(provider, "c");

    let stats = strategy.stats();
    assert_eq!(stats["b"].error_count, 1);
    assert_eq!(stats["c"].call_count, 1);
}
