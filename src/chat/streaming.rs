//! Single-consumer streamed completions with deferred usage
//!
//! A producer task drains the provider's chunk stream into a bounded channel.
//! [`ChatStream`] is the only reader of that channel; when it yields the
//! terminal entry it fulfils the paired [`UsageFuture`]. Usage therefore
//! resolves exactly once, and only after the stream has been consumed to its
//! end.

use super::models::{StreamEntry, TokenUsage};
use crate::error::{GatewayError, Result};
use crate::observability::GatewayMetrics;
use crate::provider::{ChatChunkStream, UsageStats};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

const STREAM_BUFFER: usize = 32;

/// Finish reason reported when the provider closes the stream without one
const DEFAULT_FINISH_REASON: &str = "stop";

/// Called with the full response text once the stream completes
pub type CompletionHook = Box<dyn FnOnce(&str, &TokenUsage) + Send>;

enum Event {
    Chunk(String),
    Done {
        finish_reason: String,
        usage: TokenUsage,
    },
    Error(GatewayError),
}

/// A streamed completion: the entry stream plus its deferred usage
pub struct StreamingChatResult {
    pub stream: ChatStream,
    pub usage: UsageFuture,
}

impl StreamingChatResult {
    /// Start the producer for `chunks` and pair its stream with a usage future
    pub(crate) fn spawn(
        chunks: ChatChunkStream,
        prompt_estimate: u32,
        metrics: Option<Arc<GatewayMetrics>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(STREAM_BUFFER);
        let (usage_tx, usage_rx) = oneshot::channel();

        tokio::spawn(produce(chunks, events_tx, prompt_estimate, metrics));

        Self {
            stream: ChatStream {
                events: events_rx,
                usage_tx: Some(usage_tx),
                on_complete: None,
                collected: String::new(),
                finished: false,
            },
            usage: UsageFuture { receiver: usage_rx },
        }
    }

    /// Register a hook that runs when the terminal entry is reached
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&str, &TokenUsage) + Send + 'static,
    {
        self.stream.on_complete = Some(Box::new(hook));
        self
    }

    /// Drain the stream, returning the full text and the resolved usage
    pub async fn collect_text(self) -> Result<(String, TokenUsage)> {
        let StreamingChatResult { mut stream, usage } = self;
        let mut text = String::new();

        while let Some(entry) = stream.next().await {
            if let Some(content) = entry?.content {
                text.push_str(&content);
            }
        }

        Ok((text, usage.await?))
    }
}

/// Stream of completion entries, ending with one terminal entry
///
/// An error ends the stream; content yielded before it is not retracted, so
/// the text seen so far is partial.
pub struct ChatStream {
    events: mpsc::Receiver<Event>,
    usage_tx: Option<oneshot::Sender<TokenUsage>>,
    on_complete: Option<CompletionHook>,
    collected: String,
    finished: bool,
}

impl Stream for ChatStream {
    type Item = Result<StreamEntry>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let event = ready!(this.events.poll_recv(cx));
        let entry = match event {
            Some(Event::Chunk(text)) => {
                this.collected.push_str(&text);
                Ok(StreamEntry {
                    content: Some(text),
                    finish_reason: None,
                })
            }
            Some(Event::Done {
                finish_reason,
                usage,
            }) => {
                this.finished = true;
                if let Some(hook) = this.on_complete.take() {
                    hook(&this.collected, &usage);
                }
                if let Some(usage_tx) = this.usage_tx.take() {
                    let _ = usage_tx.send(usage);
                }
                Ok(StreamEntry {
                    content: None,
                    finish_reason: Some(finish_reason),
                })
            }
            Some(Event::Error(e)) => {
                this.finished = true;
                this.usage_tx = None;
                Err(e)
            }
            None => {
                this.finished = true;
                this.usage_tx = None;
                Err(GatewayError::Internal(
                    "Stream producer stopped without finishing".to_string(),
                ))
            }
        };

        Poll::Ready(Some(entry))
    }
}

/// Usage of a streamed completion
///
/// Stays pending until the paired [`ChatStream`] yields its terminal entry.
/// Resolves to an error if the stream fails or is dropped before that.
pub struct UsageFuture {
    receiver: oneshot::Receiver<TokenUsage>,
}

impl Future for UsageFuture {
    type Output = Result<TokenUsage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map_err(|_| {
            GatewayError::Internal("Stream ended before completion".to_string())
        })
    }
}

/// Normalize provider usage counters; missing counters become zero
pub(crate) fn normalize_usage(stats: Option<&UsageStats>) -> TokenUsage {
    match stats {
        Some(stats) => {
            let prompt = stats.prompt_tokens.unwrap_or(0);
            let completion = stats.completion_tokens.unwrap_or(0);
            TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: stats.total_tokens.unwrap_or(prompt + completion),
            }
        }
        None => TokenUsage::default(),
    }
}

async fn produce(
    mut chunks: ChatChunkStream,
    events: mpsc::Sender<Event>,
    prompt_estimate: u32,
    metrics: Option<Arc<GatewayMetrics>>,
) {
    let mut fragments = 0u32;
    let mut finish_reason = None;
    let mut reported = None;

    while let Some(item) = chunks.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Completion stream failed after {} fragments: {}", fragments, e);
                let _ = events.send(Event::Error(e)).await;
                return;
            }
        };

        if chunk.usage.is_some() {
            reported = chunk.usage;
        }

        for choice in chunk.choices {
            let content = choice
                .delta
                .and_then(|d| d.content)
                .filter(|c| !c.is_empty());
            if let Some(content) = content {
                fragments += 1;
                if events.send(Event::Chunk(content)).await.is_err() {
                    debug!("Stream consumer dropped; stopping producer");
                    return;
                }
            }
            if choice.finish_reason.is_some() {
                finish_reason = choice.finish_reason;
            }
        }
    }

    // Without provider usage, estimate the prompt and count one token per fragment
    let usage = match reported {
        Some(stats) => normalize_usage(Some(&stats)),
        None => TokenUsage::new(prompt_estimate, fragments),
    };
    if let Some(metrics) = &metrics {
        metrics.record_tokens(usage.prompt_tokens as u64, usage.completion_tokens as u64);
    }

    let _ = events
        .send(Event::Done {
            finish_reason: finish_reason.unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
            usage,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatCompletionChunk;
    use futures::stream;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready_ok};

    fn chunks(items: Vec<Result<ChatCompletionChunk>>) -> ChatChunkStream {
        stream::iter(items).boxed()
    }

    fn hello_world() -> ChatChunkStream {
        chunks(vec![
            Ok(ChatCompletionChunk::content("Hello")),
            Ok(ChatCompletionChunk::content(" world")),
            Ok(ChatCompletionChunk::finish("stop")),
        ])
    }

    #[tokio::test]
    async fn test_usage_resolves_after_terminal_entry() {
        let StreamingChatResult { mut stream, usage } = StreamingChatResult::spawn(hello_world(), 7, None);
        let mut usage = tokio_test::task::spawn(usage);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("Hello"));
        assert_pending!(usage.poll());

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.content.as_deref(), Some(" world"));
        assert_pending!(usage.poll());

        let terminal = stream.next().await.unwrap().unwrap();
        assert!(terminal.is_terminal());
        assert_eq!(terminal.content, None);
        assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
        assert!(stream.next().await.is_none());

        let usage = assert_ready_ok!(usage.poll());
        assert_eq!(usage, TokenUsage::new(7, 2));
    }

    #[tokio::test]
    async fn test_abandoned_stream_never_resolves_usage() {
        let StreamingChatResult { mut stream, usage } = StreamingChatResult::spawn(hello_world(), 7, None);

        stream.next().await.unwrap().unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(50), usage).await;
        assert!(waited.is_err());
        drop(stream);
    }

    #[tokio::test]
    async fn test_dropped_stream_fails_usage() {
        let result = StreamingChatResult::spawn(hello_world(), 7, None);
        let StreamingChatResult { stream, usage } = result;
        drop(stream);

        assert!(usage.await.is_err());
    }

    #[tokio::test]
    async fn test_provider_usage_wins_over_estimate() {
        let mut last = ChatCompletionChunk::finish("length");
        last.usage = Some(UsageStats {
            prompt_tokens: Some(12),
            completion_tokens: Some(30),
            total_tokens: Some(42),
        });
        let result = StreamingChatResult::spawn(
            chunks(vec![Ok(ChatCompletionChunk::content("partial")), Ok(last)]),
            1,
            None,
        );

        let (text, usage) = result.collect_text().await.unwrap();
        assert_eq!(text, "partial");
        assert_eq!(usage.total_tokens, 42);
        assert_eq!(usage.completion_tokens, 30);
    }

    #[tokio::test]
    async fn test_missing_finish_reason_defaults_to_stop() {
        let result = StreamingChatResult::spawn(chunks(vec![Ok(ChatCompletionChunk::content("hi"))]), 0, None);
        let StreamingChatResult { stream, usage } = result;

        let entries: Vec<_> = stream.collect().await;
        let terminal = entries.last().unwrap().as_ref().unwrap();
        assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
        assert!(usage.await.is_ok());
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_prior_content() {
        let result = StreamingChatResult::spawn(
            chunks(vec![
                Ok(ChatCompletionChunk::content("partial")),
                Err(GatewayError::provider("connection reset", None)),
            ]),
            0,
            None,
        );
        let StreamingChatResult { mut stream, usage } = result;

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("partial"));
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert!(usage.await.is_err());
    }

    #[tokio::test]
    async fn test_completion_hook_receives_full_text() {
        let captured = Arc::new(parking_lot::Mutex::new(None));
        let sink = captured.clone();

        let result = StreamingChatResult::spawn(hello_world(), 3, None).on_complete(move |text, usage| {
            *sink.lock() = Some((text.to_string(), usage.total_tokens));
        });
        result.collect_text().await.unwrap();

        assert_eq!(*captured.lock(), Some(("Hello world".to_string(), 5)));
    }

    #[test]
    fn test_normalize_usage() {
        assert_eq!(normalize_usage(None), TokenUsage::default());

        let partial = UsageStats {
            prompt_tokens: Some(4),
            completion_tokens: None,
            total_tokens: None,
        };
        assert_eq!(normalize_usage(Some(&partial)), TokenUsage::new(4, 0));
    }
}
