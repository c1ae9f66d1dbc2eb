//! Chat completions over the provider transport

use super::models::*;
use super::streaming::{normalize_usage, StreamingChatResult};
use crate::error::{GatewayError, Result};
use crate::gateway::{CallOptions, GatewayInvoker};
use crate::provider::{ChatCompletionRequest, ProviderTransport};
use crate::token_estimator::TokenEstimator;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Completes chat conversations, whole or streamed
pub struct ChatService {
    transport: Arc<dyn ProviderTransport>,
    invoker: Arc<GatewayInvoker>,
    deployment: String,
    defaults: ChatCompletionOptions,
    estimator: TokenEstimator,
}

impl ChatService {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        invoker: Arc<GatewayInvoker>,
        deployment: impl Into<String>,
        defaults: ChatCompletionOptions,
    ) -> Self {
        Self {
            transport,
            invoker,
            deployment: deployment.into(),
            defaults,
            estimator: TokenEstimator::default(),
        }
    }

    pub fn default_options(&self) -> &ChatCompletionOptions {
        &self.defaults
    }

    /// Complete `messages` with the default generation options
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletionResult> {
        self.complete_with_options(messages, &self.defaults).await
    }

    #[instrument(skip_all, fields(messages = messages.len()))]
    pub async fn complete_with_options(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> Result<ChatCompletionResult> {
        let request = self.request(messages, options, false)?;
        let transport = self.transport.clone();

        let response = self
            .invoker
            .call(
                "chat_completion",
                move || {
                    let transport = transport.clone();
                    let request = request.clone();
                    async move { transport.chat_completion(&request).await }
                },
                CallOptions::default(),
            )
            .await?;

        let usage = normalize_usage(response.usage.as_ref());
        if let Some(metrics) = self.invoker.metrics() {
            metrics.record_tokens(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            GatewayError::MalformedResponse("Response contained no choices".to_string())
        })?;
        let message = choice.message.and_then(|m| m.content).ok_or_else(|| {
            GatewayError::MalformedResponse("Response contained no message content".to_string())
        })?;

        debug!(
            "Completion finished ({:?}, {} tokens)",
            choice.finish_reason, usage.total_tokens
        );

        Ok(ChatCompletionResult {
            message,
            role: Role::Assistant,
            finish_reason: choice.finish_reason,
            usage,
            model: response.model.unwrap_or_else(|| self.deployment.clone()),
        })
    }

    /// Stream a completion of `messages` with the default generation options
    pub async fn stream_complete(&self, messages: &[ChatMessage]) -> Result<StreamingChatResult> {
        self.stream_complete_with_options(messages, &self.defaults).await
    }

    /// Open a streamed completion
    ///
    /// Retry and throttling cover opening the stream only; fragments are not
    /// retried once the provider starts sending them.
    #[instrument(skip_all, fields(messages = messages.len()))]
    pub async fn stream_complete_with_options(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> Result<StreamingChatResult> {
        let request = self.request(messages, options, true)?;
        let transport = self.transport.clone();

        let chunks = self
            .invoker
            .call(
                "chat_completion_stream",
                move || {
                    let transport = transport.clone();
                    let request = request.clone();
                    async move { transport.chat_completion_stream(&request).await }
                },
                CallOptions::default(),
            )
            .await?;

        let prompt_estimate = self.estimator.estimate_messages(messages);
        Ok(StreamingChatResult::spawn(
            chunks,
            prompt_estimate,
            self.invoker.metrics().cloned(),
        ))
    }

    fn request(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Result<Arc<ChatCompletionRequest>> {
        if messages.is_empty() {
            return Err(GatewayError::Validation(
                "At least one message is required".to_string(),
            ));
        }

        Ok(Arc::new(ChatCompletionRequest::new(
            self.deployment.clone(),
            messages.to_vec(),
            options,
            stream,
        )))
    }
}
