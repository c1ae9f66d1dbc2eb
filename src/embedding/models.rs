//! Result and option types for the embedding pipelines

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedding of a single text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,

    /// Source text
    pub text: String,

    /// Tokens attributed to this text; zero when served from cache
    pub token_count: u32,
}

/// Embeddings for a list of texts, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbeddingResult {
    pub embeddings: Vec<EmbeddingResult>,

    /// Provider tokens summed across groups
    pub total_tokens: u32,

    #[serde(with = "duration_ms")]
    pub processing_time: Duration,
}

/// One embedded chunk of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunkEmbedding {
    #[serde(flatten)]
    pub result: EmbeddingResult,

    pub chunk_index: usize,

    /// First-occurrence character offset of the chunk in the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
}

/// Embeddings for every chunk of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEmbeddingResult {
    pub chunks: Vec<DocumentChunkEmbedding>,

    pub total_tokens: u32,

    #[serde(with = "duration_ms")]
    pub processing_time: Duration,
}

/// Options for [`embed_batch`](super::EmbeddingService::embed_batch)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Texts per provider call
    pub batch_size: usize,

    /// Submit all groups at once instead of one after another
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            parallel: false,
        }
    }
}

/// Options for [`embed_document`](super::EmbeddingService::embed_document)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub chunk_size: usize,
    pub overlap: usize,
    pub batch_size: usize,

    /// Locate each chunk's character offsets in the source
    pub include_metadata: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            overlap: 200,
            batch_size: 10,
            include_metadata: false,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_serializes_millis() {
        let result = BatchEmbeddingResult {
            embeddings: vec![],
            total_tokens: 4,
            processing_time: Duration::from_millis(1500),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processing_time"], 1500);
        assert_eq!(json["total_tokens"], 4);
    }

    #[test]
    fn test_chunk_omits_missing_offsets() {
        let chunk = DocumentChunkEmbedding {
            result: EmbeddingResult {
                embedding: vec![0.5],
                text: "hi".to_string(),
                token_count: 1,
            },
            chunk_index: 0,
            start_offset: None,
            end_offset: None,
        };

        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["text"], "hi");
        assert!(json.get("start_offset").is_none());
    }
}
