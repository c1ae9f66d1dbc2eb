//! Scripted in-memory provider transport shared by the integration tests

#![allow(dead_code)]

use ai_gateway::config::{GatewayConfig, ProviderConfig};
use ai_gateway::error::{GatewayError, Result};
use ai_gateway::provider::models::{ChatChoice, EmbeddingData, ResponseMessage};
use ai_gateway::provider::{
    ChatChunkStream, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
    EmbeddingRequest, EmbeddingResponse, ProviderTransport, UsageStats,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const TEST_DIMENSION: usize = 8;

/// Configuration pointing at a fake endpoint with fast retries
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::new(ProviderConfig {
        endpoint: "https://unit-test.openai.azure.com".to_string(),
        api_key: secrecy::Secret::new("test-key".to_string()),
        api_version: "2024-02-01".to_string(),
        chat_deployment: "chat-dep".to_string(),
        embedding_deployment: "embed-dep".to_string(),
        timeout_secs: 5,
    });
    config.retry.base_delay_ms = 1;
    config.rate_limit.requests_per_minute = 1000;
    config.embedding.dimension = TEST_DIMENSION;
    config.logging.level = "warn".to_string();
    config
}

/// Deterministic vector for `text`: first component is its char count
pub fn vector_for(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dimension];
    if let Some(first) = vector.first_mut() {
        *first = text.chars().count() as f32;
    }
    vector
}

/// Transport answering from a script and recording every request
pub struct MockTransport {
    pub dimension: usize,
    pub reply: String,
    pub fragments: Vec<String>,
    pub omit_choices: bool,

    /// Leading calls of each kind that fail with a 503
    pub failures_before_success: usize,

    pub chat_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub embedding_calls: AtomicUsize,
    pub chat_requests: Mutex<Vec<ChatCompletionRequest>>,
    pub embedding_inputs: Mutex<Vec<Vec<String>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            dimension: TEST_DIMENSION,
            reply: "Hello from the assistant".to_string(),
            fragments: vec!["Hel".to_string(), "lo".to_string(), "!".to_string()],
            omit_choices: false,
            failures_before_success: 0,
            chat_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            embedding_calls: AtomicUsize::new(0),
            chat_requests: Mutex::new(Vec::new()),
            embedding_inputs: Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    pub fn total_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
            + self.stream_calls.load(Ordering::SeqCst)
            + self.embedding_calls.load(Ordering::SeqCst)
    }

    pub fn last_chat_request(&self) -> Option<ChatCompletionRequest> {
        self.chat_requests.lock().unwrap().last().cloned()
    }

    fn maybe_fail(&self, call_number: usize) -> Result<()> {
        if call_number < self.failures_before_success {
            return Err(GatewayError::provider("Status 503: unavailable", Some(503)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderTransport for MockTransport {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let call = self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_requests.lock().unwrap().push(request.clone());
        self.maybe_fail(call)?;

        let choices = if self.omit_choices {
            Vec::new()
        } else {
            vec![ChatChoice {
                index: 0,
                message: Some(ResponseMessage {
                    role: Some("assistant".to_string()),
                    content: Some(self.reply.clone()),
                }),
                finish_reason: Some("stop".to_string()),
            }]
        };

        Ok(ChatCompletionResponse {
            id: Some("chatcmpl-test".to_string()),
            model: Some("gpt-test".to_string()),
            choices,
            usage: Some(UsageStats {
                prompt_tokens: Some(10),
                completion_tokens: Some(5),
                total_tokens: Some(15),
            }),
        })
    }

    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChatChunkStream> {
        let call = self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_requests.lock().unwrap().push(request.clone());
        self.maybe_fail(call)?;

        let mut chunks: Vec<Result<ChatCompletionChunk>> = self
            .fragments
            .iter()
            .map(|f| Ok(ChatCompletionChunk::content(f.as_str())))
            .collect();
        chunks.push(Ok(ChatCompletionChunk::finish("stop")));

        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let call = self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        self.embedding_inputs.lock().unwrap().push(request.input.clone());
        self.maybe_fail(call)?;

        // Reverse order so callers must sort by index
        let data = request
            .input
            .iter()
            .enumerate()
            .rev()
            .map(|(index, text)| EmbeddingData {
                embedding: vector_for(text, self.dimension),
                index,
            })
            .collect();

        let tokens: u32 = request.input.iter().map(|t| t.len() as u32).sum();
        Ok(EmbeddingResponse {
            data,
            model: Some("embedding-test".to_string()),
            usage: Some(UsageStats {
                prompt_tokens: Some(tokens),
                completion_tokens: None,
                total_tokens: Some(tokens),
            }),
        })
    }
}
