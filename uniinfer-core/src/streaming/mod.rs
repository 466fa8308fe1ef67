//! Unified stream parsing for the two streaming wire families
//!
//! Backends stream completions either as Server-Sent-Events-style
//! `data: {...}` lines terminated by `data: [DONE]`, or as
//! newline-delimited JSON objects terminated by a `"done": true` field in
//! the final object. Both are normalized here into one [`ChatStream`] of
//! delta chunks; the per-adapter extractor closure is the only place
//! format knowledge about the payload lives.
//!
//! Shared fragment rules, whatever the framing:
//! - a malformed fragment is skipped with a warning, never fatal; only
//!   transport failure aborts the stream;
//! - fragments carrying no textual delta (role-only or empty-content)
//!   are dropped rather than yielded;
//! - chunks are yielded in transport order.

use crate::protocol::{ChatCompletionResponse, Message, Usage};
use crate::providers::error::{ProviderResult, UniInferError};
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;

use crate::providers::adapter::ChatStream;

/// SSE end-of-stream sentinel payload
const SSE_DONE: &str = "[DONE]";

/// What an adapter's extractor pulls out of one parsed stream fragment.
///
/// Returning `None` from the extractor drops the fragment (no delta).
pub struct StreamDelta {
    /// Incremental text for this chunk
    pub content: String,

    /// Model echoed by the backend in this fragment, if any
    pub model: Option<String>,

    /// Usage figures, when the backend attaches them to a fragment
    pub usage: Option<Usage>,
}

impl StreamDelta {
    /// Delta with content only, the common case
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            usage: None,
        }
    }
}

fn chunk_from(
    delta: StreamDelta,
    raw: Value,
    provider: &str,
    requested_model: Option<&str>,
) -> ChatCompletionResponse {
    let model = delta
        .model
        .or_else(|| requested_model.map(str::to_string))
        .unwrap_or_default();
    ChatCompletionResponse {
        message: Message::assistant(delta.content),
        provider: provider.to_string(),
        model,
        usage: delta.usage.unwrap_or_default(),
        raw_response: raw,
    }
}

/// Parse an SSE-style byte stream (`data: {...}` events, `data: [DONE]`
/// sentinel) into a stream of delta chunks.
///
/// Iteration terminates at the sentinel or at transport EOF, whichever
/// comes first; some backends (Anthropic) never send a sentinel and end
/// the event stream instead.
pub fn sse_stream<S, F>(
    bytes: S,
    provider: String,
    requested_model: Option<String>,
    extract: F,
) -> ChatStream
where
    S: Stream<Item = ProviderResult<Bytes>> + Send + 'static,
    F: Fn(&Value) -> Option<StreamDelta> + Send + 'static,
{
    let stream = bytes
        .eventsource()
        .take_while(|event| {
            let done = matches!(event, Ok(ev) if ev.data.trim() == SSE_DONE);
            futures::future::ready(!done)
        })
        .filter_map(move |event| {
            let item = match event {
                Ok(ev) => {
                    if ev.data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<Value>(&ev.data) {
                            Ok(value) => extract(&value)
                                .map(|delta| Ok(chunk_from(delta, value, &provider, requested_model.as_deref()))),
                            Err(err) => {
                                warn!(provider = %provider, error = %err, "skipping malformed stream event");
                                None
                            }
                        }
                    }
                }
                Err(err) => Some(Err(UniInferError::Provider(format!(
                    "{provider}: stream transport error: {err}"
                )))),
            };
            futures::future::ready(item)
        });
    Box::pin(stream)
}

/// Parse a newline-delimited-JSON byte stream into a stream of delta
/// chunks, terminating when an object carries `"done": true`.
pub fn ndjson_stream<S, F>(
    bytes: S,
    provider: String,
    requested_model: Option<String>,
    extract: F,
) -> ChatStream
where
    S: Stream<Item = ProviderResult<Bytes>> + Send + 'static,
    F: Fn(&Value) -> Option<StreamDelta> + Send + 'static,
{
    struct State<F> {
        inner: futures::stream::BoxStream<'static, ProviderResult<Bytes>>,
        buf: Vec<u8>,
        finished: bool,
        provider: String,
        requested_model: Option<String>,
        extract: F,
    }

    enum LineOutcome {
        Chunk(ChatCompletionResponse),
        Done,
        Skip,
    }

    impl<F> State<F>
    where
        F: Fn(&Value) -> Option<StreamDelta>,
    {
        fn handle_line(&self, line: &[u8]) -> LineOutcome {
            let text = String::from_utf8_lossy(line);
            let text = text.trim();
            if text.is_empty() {
                return LineOutcome::Skip;
            }
            let value: Value = match serde_json::from_str(text) {
                Ok(value) => value,
                Err(err) => {
                    warn!(provider = %self.provider, error = %err, "skipping malformed stream line");
                    return LineOutcome::Skip;
                }
            };
            if value.get("done").and_then(Value::as_bool).unwrap_or(false) {
                return LineOutcome::Done;
            }
            match (self.extract)(&value) {
                Some(delta) => LineOutcome::Chunk(chunk_from(
                    delta,
                    value,
                    &self.provider,
                    self.requested_model.as_deref(),
                )),
                None => LineOutcome::Skip,
            }
        }
    }

    let state = State {
        inner: bytes.boxed(),
        buf: Vec::new(),
        finished: false,
        provider,
        requested_model,
        extract,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            // Drain complete lines already buffered before polling again.
            if let Some(pos) = st.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=pos).collect();
                match st.handle_line(&line) {
                    LineOutcome::Chunk(chunk) => return Some((Ok(chunk), st)),
                    LineOutcome::Done => {
                        st.finished = true;
                        return None;
                    }
                    LineOutcome::Skip => continue,
                }
            }

            match st.inner.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(err)) => {
                    st.finished = true;
                    return Some((Err(err), st));
                }
                None => {
                    // Transport EOF: a trailing line may lack its newline.
                    st.finished = true;
                    if st.buf.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut st.buf);
                    match st.handle_line(&line) {
                        LineOutcome::Chunk(chunk) => return Some((Ok(chunk), st)),
                        LineOutcome::Done | LineOutcome::Skip => return None,
                    }
                }
            }
        }
    });
    Box::pin(stream)
}
