//! Streaming contracts, emulation for non-incremental backends, and stream utilities.
//!
//! ```rust
//! use qprovider::{ChunkStream, StreamChunk, VecChunkStream};
//!
//! let stream = VecChunkStream::new(vec![Ok(StreamChunk::delta("gpt-4o-mini", "hello"))]);
//! let _boxed: ChunkStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_stream::{stream, try_stream};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{ChatCompletionResponse, FinishReason, ProviderError, StreamChunk};

/// Default delay between emulated chunks.
pub const DEFAULT_STREAM_PACING: Duration = Duration::from_millis(10);

/// Chunk stream contract.
///
/// Invariants for consumers:
/// - Chunks arrive in source order.
/// - Exactly one chunk carries a finish reason and it is the last item.
/// - An error item may appear before the first chunk or mid-sequence; nothing follows it.
pub trait ChunkEventStream: Stream<Item = Result<StreamChunk, ProviderError>> + Send {}

impl<T> ChunkEventStream for T where T: Stream<Item = Result<StreamChunk, ProviderError>> + Send {}

pub type ChunkStream<'a> = Pin<Box<dyn ChunkEventStream + 'a>>;

#[derive(Debug)]
pub struct VecChunkStream {
    chunks: VecDeque<Result<StreamChunk, ProviderError>>,
}

impl VecChunkStream {
    pub fn new(chunks: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

impl Stream for VecChunkStream {
    type Item = Result<StreamChunk, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<StreamChunk, ProviderError>>> {
        Poll::Ready(self.chunks.pop_front())
    }
}

/// Re-segments a finished response into word-level chunks.
///
/// Each segment keeps its trailing whitespace, so the concatenated deltas equal
/// `response.text`. A zero `pacing` only yields to the scheduler between chunks.
pub fn emulate_stream<'a>(response: ChatCompletionResponse, pacing: Duration) -> ChunkStream<'a> {
    let ChatCompletionResponse {
        model,
        text,
        finish_reason,
        ..
    } = response;

    let chunks = stream! {
        for segment in text.split_inclusive(char::is_whitespace) {
            yield Ok::<_, ProviderError>(StreamChunk::delta(model.clone(), segment));
            pace(pacing).await;
        }

        yield Ok::<_, ProviderError>(StreamChunk::terminal(model, finish_reason));
    };

    Box::pin(chunks)
}

/// Ends `source` at its first terminal chunk, synthesizing a `Stop` terminal chunk when
/// the backend closes without reporting one.
pub fn until_final<'a, S>(fallback_model: String, source: S) -> ChunkStream<'a>
where
    S: Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'a,
{
    let chunks = try_stream! {
        let mut source = Box::pin(source);
        let mut model = fallback_model;
        let mut finished = false;

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            if !chunk.model.is_empty() {
                model = chunk.model.clone();
            }

            if chunk.is_final() {
                finished = true;
                yield chunk;
                break;
            }

            yield chunk;
        }

        if !finished {
            yield StreamChunk::terminal(model, FinishReason::Stop);
        }
    };

    Box::pin(chunks)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectedStream {
    pub model: String,
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

/// Drains a chunk stream into its concatenated text.
pub async fn collect_stream(mut stream: ChunkStream<'_>) -> Result<CollectedStream, ProviderError> {
    let mut collected = CollectedStream::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        collected.model = chunk.model;
        if let Some(text) = chunk.text {
            collected.text.push_str(&text);
        }

        if chunk.finish_reason.is_some() {
            collected.finish_reason = chunk.finish_reason;
            break;
        }
    }

    Ok(collected)
}

async fn pace(pacing: Duration) {
    if pacing.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(pacing).await;
    }
}
