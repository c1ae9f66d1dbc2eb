//! AI Gateway - Rate-limited, retrying client for Azure OpenAI chat and embeddings
//!
//! Every provider call funnels through one [`gateway::GatewayInvoker`], which
//! applies the retry policy and a process-wide sliding-window throttle. On top
//! of it sit the embedding pipelines (single text, batch, chunked document),
//! chat completions (whole or streamed) and stateful conversation sessions.
//!
//! ## Features
//!
//! - **Rate Limiting**: Single-flight FIFO queue capping requests per minute
//! - **Retries**: Linear backoff by default, exponential on request
//! - **Streaming**: Token streams with usage resolved on completion
//! - **Document Embedding**: Boundary-aware chunking with overlap
//! - **Observability**: Structured logging, metrics and health probes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_gateway::prelude::*;
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let gateway = AiGateway::new(GatewayConfig::from_env()?)?;
//!
//!     let embedding = gateway.embeddings().embed("Quarterly revenue grew 12%").await?;
//!     println!("{} dimensions", embedding.embedding.len());
//!
//!     let mut session = gateway.session(PromptTemplate::default());
//!     session.update_context(HashMap::from([
//!         ("prospect_name".to_string(), "Ada".to_string()),
//!         ("company".to_string(), "Acme".to_string()),
//!         ("product".to_string(), "the analytics suite".to_string()),
//!     ]));
//!     let reply = session.send("What does it cost?").await?;
//!     println!("{}", reply.message);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod provider;
pub mod token_estimator;

pub use client::AiGateway;
pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chat::{
        ChatCompletionOptions, ChatCompletionResult, ChatMessage, ChatService, ConversationSession,
        PromptTemplate, Role, StreamEntry, StreamingChatResult, TokenUsage,
    };
    pub use crate::client::AiGateway;
    pub use crate::config::GatewayConfig;
    pub use crate::embedding::{
        cosine_similarity, BatchOptions, DocumentOptions, EmbeddingProvider, EmbeddingService,
        TextChunker,
    };
    pub use crate::error::{ErrorKind, GatewayError, Result};
    pub use crate::gateway::{CallOptions, GatewayInvoker, RateLimitManager, RetryPolicy};
    pub use crate::observability::{GatewayHealth, GatewayMetrics, HealthChecker};
    pub use crate::provider::{AzureOpenAiClient, ProviderTransport};
}
