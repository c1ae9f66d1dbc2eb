//! Process-wide wiring of transport, throttle, invoker and services

use crate::chat::{ChatService, ConversationSession, PromptTemplate};
use crate::config::GatewayConfig;
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::gateway::{GatewayInvoker, RateLimitManager, RetryPolicy};
use crate::observability::{GatewayMetrics, HealthChecker};
use crate::provider::{AzureOpenAiClient, ProviderTransport};
use std::sync::Arc;
use tracing::info;

/// Entry point owning one set of shared gateway components
///
/// Construct once at startup and hand the services out by `Arc`. All services
/// share the same rate limiter, so the requests-per-minute cap holds across
/// embeddings and chat.
pub struct AiGateway {
    config: GatewayConfig,
    transport: Arc<dyn ProviderTransport>,
    invoker: Arc<GatewayInvoker>,
    metrics: Arc<GatewayMetrics>,
    embeddings: Arc<EmbeddingService>,
    chat: Arc<ChatService>,
}

impl AiGateway {
    /// Build a gateway talking to Azure OpenAI over HTTP
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(AzureOpenAiClient::new(config.provider.clone())?);
        Self::with_transport(config, transport)
    }

    /// Build a gateway from the conventional environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    /// Build a gateway over any transport
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn ProviderTransport>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(GatewayMetrics::new());
        let limiter = Arc::new(RateLimitManager::with_metrics(&config.rate_limit, metrics.clone()));
        let invoker = Arc::new(
            GatewayInvoker::new(RetryPolicy::from(&config.retry), limiter).with_metrics(metrics.clone()),
        );

        let embeddings = Arc::new(EmbeddingService::new(
            transport.clone(),
            invoker.clone(),
            config.provider.embedding_deployment.clone(),
            config.embedding.clone(),
        ));
        let chat = Arc::new(ChatService::new(
            transport.clone(),
            invoker.clone(),
            config.provider.chat_deployment.clone(),
            config.chat.clone(),
        ));

        info!(
            "AI gateway ready (chat={}, embeddings={}, rpm={})",
            config.provider.chat_deployment,
            config.provider.embedding_deployment,
            config.rate_limit.requests_per_minute
        );

        Ok(Self {
            config,
            transport,
            invoker,
            metrics,
            embeddings,
            chat,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn ProviderTransport> {
        &self.transport
    }

    pub fn invoker(&self) -> &Arc<GatewayInvoker> {
        &self.invoker
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn embeddings(&self) -> Arc<EmbeddingService> {
        self.embeddings.clone()
    }

    pub fn chat(&self) -> Arc<ChatService> {
        self.chat.clone()
    }

    /// Start a conversation rendered from `template`
    pub fn session(&self, template: PromptTemplate) -> ConversationSession {
        ConversationSession::new(self.chat.clone(), template)
    }

    /// Health checker probing this gateway's embedding and chat services
    pub fn health_checker(&self) -> HealthChecker {
        HealthChecker::new()
            .with_embeddings(self.embeddings.clone())
            .with_chat(self.chat.clone())
    }
}
