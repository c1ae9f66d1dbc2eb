//! Wire models for provider requests and responses
//!
//! Response fields the provider may omit are decoded as `Option` or
//! defaulted; services turn missing required parts into
//! [`GatewayError::MalformedResponse`](crate::error::GatewayError).

use serde::{Deserialize, Serialize};

use crate::chat::{ChatCompletionOptions, ChatMessage};

/// Request for a chat completion
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Deployment to route to; part of the URL, not the body
    #[serde(skip)]
    pub deployment: String,

    pub messages: Vec<ChatMessage>,

    pub max_tokens: u32,

    pub temperature: f32,

    pub top_p: f32,

    pub frequency_penalty: f32,

    pub presence_penalty: f32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    pub stream: bool,
}

impl ChatCompletionRequest {
    pub fn new(
        deployment: impl Into<String>,
        messages: Vec<ChatMessage>,
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Self {
        Self {
            deployment: deployment.into(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            stop: options.stop.clone(),
            stream,
        }
    }
}

/// Response from a non-streaming chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    #[serde(default)]
    pub usage: Option<UsageStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,

    #[serde(default)]
    pub message: Option<ResponseMessage>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

/// One decoded server-sent event of a streaming completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Present only when the provider reports usage on the stream
    #[serde(default)]
    pub usage: Option<UsageStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Chunk carrying a single content fragment
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            model: None,
            choices: vec![ChunkChoice {
                delta: Some(ChunkDelta { role: None, content: Some(text.into()) }),
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// Chunk carrying only a finish reason
    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            model: None,
            choices: vec![ChunkChoice {
                delta: None,
                finish_reason: Some(reason.into()),
            }],
            usage: None,
        }
    }
}

/// Token usage statistics as reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,

    #[serde(default)]
    pub completion_tokens: Option<u32>,

    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Request to generate embeddings
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Deployment to route to; part of the URL, not the body
    #[serde(skip)]
    pub deployment: String,

    /// Input texts to embed
    pub input: Vec<String>,
}

impl EmbeddingRequest {
    pub fn new(deployment: impl Into<String>, input: Vec<String>) -> Self {
        Self {
            deployment: deployment.into(),
            input,
        }
    }
}

/// Response from embedding generation
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// Generated embeddings
    #[serde(default)]
    pub data: Vec<EmbeddingData>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub usage: Option<UsageStats>,
}

/// Individual embedding data
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    /// Embedding vector
    pub embedding: Vec<f32>,

    /// Index in the batch
    #[serde(default)]
    pub index: usize,
}
