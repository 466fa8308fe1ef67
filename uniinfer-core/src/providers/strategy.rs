//! Routing strategies layered on top of the registry
//!
//! [`FallbackStrategy`] tries providers strictly in the caller-supplied
//! order until one succeeds, keeping per-provider latency and error
//! bookkeeping. [`CostBasedStrategy`] is a thin policy wrapper that
//! orders providers cheapest-first and delegates everything else.
//!
//! The provider loop is strictly sequential; providers are never raced
//! in parallel.

use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::adapter::ChatStream;
use crate::providers::error::{ProviderResult, UniInferError};
use crate::providers::registry::ProviderRegistry;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Rolling latency window size per provider
const LATENCY_WINDOW: usize = 10;

#[derive(Default)]
struct ProviderStats {
    /// Most recent successful-call latencies, FIFO-evicted
    latencies: VecDeque<Duration>,
    error_count: u64,
    call_count: u64,
}

/// Read-only view of one provider's bookkeeping, derived from the
/// retained samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatsSnapshot {
    /// Mean latency over retained samples; `None` until a success
    pub avg_latency: Option<Duration>,

    /// Fastest retained sample
    pub min_latency: Option<Duration>,

    /// Slowest retained sample
    pub max_latency: Option<Duration>,

    /// Failed attempts, monotonically increasing
    pub error_count: u64,

    /// Attempts dispatched to the provider (successes and failures)
    pub call_count: u64,
}

impl ProviderStats {
    fn snapshot(&self) -> ProviderStatsSnapshot {
        let avg_latency = if self.latencies.is_empty() {
            None
        } else {
            let total: Duration = self.latencies.iter().sum();
            Some(total / self.latencies.len() as u32)
        };
        ProviderStatsSnapshot {
            avg_latency,
            min_latency: self.latencies.iter().min().copied(),
            max_latency: self.latencies.iter().max().copied(),
            error_count: self.error_count,
            call_count: self.call_count,
        }
    }
}

/// Ordered try-until-success routing across multiple providers.
///
/// Providers are attempted in the given priority order, each up to
/// `max_retries + 1` times; the first success wins and no further
/// providers are tried. A single provider's failure is never propagated
/// directly; only total exhaustion raises, as
/// [`UniInferError::AllProvidersFailed`] carrying the last underlying
/// error text.
pub struct FallbackStrategy {
    registry: Arc<ProviderRegistry>,
    providers: Vec<String>,
    max_retries: u32,
    stats: Mutex<HashMap<String, ProviderStats>>,
}

impl FallbackStrategy {
    /// Create a strategy trying `providers` in order, once each
    pub fn new(registry: Arc<ProviderRegistry>, providers: Vec<String>) -> Self {
        Self {
            registry,
            providers,
            max_retries: 0,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Set additional attempts per provider before moving on.
    ///
    /// `0` (the default) tries each provider exactly once. Retries are
    /// immediate, with no backoff or jitter.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The configured provider order
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Perform a completion, falling back through the provider list.
    ///
    /// Returns the response together with the name of the provider that
    /// served it.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<(ChatCompletionResponse, String)> {
        request.validate()?;
        let mut last_error: Option<UniInferError> = None;

        for name in &self.providers {
            for attempt in 0..=self.max_retries {
                let provider = match self.registry.get(name) {
                    Ok(provider) => provider,
                    Err(err) => {
                        // Construction failures (unregistered, no key)
                        // won't change on retry; move to the next provider.
                        warn!(provider = %name, error = %err, "provider unavailable");
                        self.record_error(name);
                        last_error = Some(err);
                        break;
                    }
                };

                self.record_call(name);
                let started = Instant::now();
                match provider.complete(request).await {
                    Ok(response) => {
                        let elapsed = started.elapsed();
                        self.record_latency(name, elapsed);
                        debug!(provider = %name, latency_ms = elapsed.as_millis() as u64, "completion succeeded");
                        return Ok((response, name.clone()));
                    }
                    Err(err) => {
                        warn!(provider = %name, attempt, error = %err, "completion attempt failed");
                        self.record_error(name);
                        last_error = Some(err);
                    }
                }
            }
        }

        Err(UniInferError::AllProvidersFailed {
            last_error: last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no providers configured".to_string()),
        })
    }

    /// Open a streaming completion, falling back through the provider
    /// list.
    ///
    /// Success means the stream opened; latency is not recorded since
    /// total duration is meaningless until the caller drains the stream.
    pub async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<(ChatStream, String)> {
        request.validate()?;
        let mut last_error: Option<UniInferError> = None;

        for name in &self.providers {
            for attempt in 0..=self.max_retries {
                let provider = match self.registry.get(name) {
                    Ok(provider) => provider,
                    Err(err) => {
                        warn!(provider = %name, error = %err, "provider unavailable");
                        self.record_error(name);
                        last_error = Some(err);
                        break;
                    }
                };

                self.record_call(name);
                match provider.stream_complete(request).await {
                    Ok(stream) => {
                        debug!(provider = %name, "stream opened");
                        return Ok((stream, name.clone()));
                    }
                    Err(err) => {
                        warn!(provider = %name, attempt, error = %err, "stream attempt failed");
                        self.record_error(name);
                        last_error = Some(err);
                    }
                }
            }
        }

        Err(UniInferError::AllProvidersFailed {
            last_error: last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no providers configured".to_string()),
        })
    }

    /// Per-provider latency and error statistics.
    ///
    /// Every configured provider has an entry; latency fields are `None`
    /// until that provider records a successful call.
    pub fn stats(&self) -> HashMap<String, ProviderStatsSnapshot> {
        let stats = self.stats.lock().unwrap();
        self.providers
            .iter()
            .map(|name| {
                let snapshot = stats
                    .get(name)
                    .map(ProviderStats::snapshot)
                    .unwrap_or_else(|| ProviderStats::default().snapshot());
                (name.clone(), snapshot)
            })
            .collect()
    }

    fn record_call(&self, name: &str) {
        let mut stats = self.stats.lock().unwrap();
        stats.entry(name.to_string()).or_default().call_count += 1;
    }

    fn record_error(&self, name: &str) {
        let mut stats = self.stats.lock().unwrap();
        stats.entry(name.to_string()).or_default().error_count += 1;
    }

    fn record_latency(&self, name: &str, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(name.to_string()).or_default();
        entry.latencies.push_back(elapsed);
        while entry.latencies.len() > LATENCY_WINDOW {
            entry.latencies.pop_front();
        }
    }
}

/// Cheapest-first routing: orders providers by cost per 1000 tokens
/// ascending, then delegates to an inner [`FallbackStrategy`] unchanged.
pub struct CostBasedStrategy {
    inner: FallbackStrategy,
}

impl CostBasedStrategy {
    /// Build from a provider→cost mapping; ties order by name so the
    /// resulting order is deterministic.
    pub fn new(registry: Arc<ProviderRegistry>, costs: &HashMap<String, f64>) -> Self {
        let mut ordered: Vec<(&String, f64)> =
            costs.iter().map(|(name, cost)| (name, *cost)).collect();
        ordered.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        let providers = ordered.into_iter().map(|(name, _)| name.clone()).collect();
        Self {
            inner: FallbackStrategy::new(registry, providers),
        }
    }

    /// Set additional attempts per provider on the inner strategy
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.inner = self.inner.with_max_retries(max_retries);
        self
    }

    /// The computed cheapest-first provider order
    pub fn provider_order(&self) -> &[String] {
        self.inner.providers()
    }

    /// Delegates to [`FallbackStrategy::complete`]
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<(ChatCompletionResponse, String)> {
        self.inner.complete(request).await
    }

    /// Delegates to [`FallbackStrategy::stream_complete`]
    pub async fn stream_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<(ChatStream, String)> {
        self.inner.stream_complete(request).await
    }

    /// Delegates to [`FallbackStrategy::stats`]
    pub fn stats(&self) -> HashMap<String, ProviderStatsSnapshot> {
        self.inner.stats()
    }
}
