//! Embedding generation, document chunking and similarity scoring

pub mod cache;
pub mod chunker;
pub mod models;
pub mod service;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use chunker::{TextChunk, TextChunker};
pub use models::{
    BatchEmbeddingResult, BatchOptions, DocumentChunkEmbedding, DocumentEmbeddingResult,
    DocumentOptions, EmbeddingResult,
};
pub use service::EmbeddingService;
pub use similarity::cosine_similarity;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Verify the provider is reachable
    async fn check_connectivity(&self) -> Result<()>;

    /// Get the dimension of embeddings
    fn embedding_dimension(&self) -> usize;
}
