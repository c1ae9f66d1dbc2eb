//! Transport seam between the gateway and the LLM provider

pub mod client;
pub mod models;

pub use client::AzureOpenAiClient;
pub use models::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse, UsageStats,
};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// Decoded chunks of a streaming completion
pub type ChatChunkStream = BoxStream<'static, Result<ChatCompletionChunk>>;

/// Raw provider operations; retry and throttling live above this trait
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Issue a non-streaming chat completion
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;

    /// Open a streaming chat completion
    ///
    /// Resolves once the provider accepted the request; chunks are then
    /// pulled from the returned stream.
    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChatChunkStream>;

    /// Generate one embedding per input text
    async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse>;
}
