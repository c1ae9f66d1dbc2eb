//! Embedding pipelines over the provider transport

use super::chunker::TextChunker;
use super::models::*;
use super::{EmbeddingCache, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{CallOptions, GatewayInvoker};
use crate::provider::{EmbeddingRequest, EmbeddingResponse, ProviderTransport};
use crate::token_estimator::TokenEstimator;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const CONNECTIVITY_PROBE: &str = "connectivity check";

/// Embeds single texts, batches and whole documents
///
/// Every provider call goes through the shared [`GatewayInvoker`].
pub struct EmbeddingService {
    transport: Arc<dyn ProviderTransport>,
    invoker: Arc<GatewayInvoker>,
    deployment: String,
    config: EmbeddingConfig,
    cache: Option<Arc<EmbeddingCache>>,
    estimator: TokenEstimator,
}

impl EmbeddingService {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        invoker: Arc<GatewayInvoker>,
        deployment: impl Into<String>,
        config: EmbeddingConfig,
    ) -> Self {
        let cache = if config.cache_enabled {
            Some(Arc::new(EmbeddingCache::new(
                config.cache_size,
                Duration::from_secs(config.cache_ttl_secs),
            )))
        } else {
            None
        };

        info!(
            "Initialized embedding service (dimension={}, cache_enabled={})",
            config.dimension, config.cache_enabled
        );

        Self {
            transport,
            invoker,
            deployment: deployment.into(),
            config,
            cache,
            estimator: TokenEstimator::default(),
        }
    }

    /// Replace the cache, e.g. to share one across services
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Embed one non-blank text
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        if text.trim().is_empty() {
            return Err(GatewayError::Validation("Text cannot be empty".to_string()));
        }

        if let Some(embedding) = self.cached(text).await {
            return Ok(EmbeddingResult {
                embedding,
                text: text.to_string(),
                token_count: 0,
            });
        }

        let (mut vectors, tokens) = self
            .request_embeddings(vec![text.to_string()], CallOptions::default())
            .await?;
        let embedding = vectors.pop().ok_or_else(|| {
            GatewayError::MalformedResponse("No embedding data returned".to_string())
        })?;

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone()).await;
        }

        Ok(EmbeddingResult {
            embedding,
            text: text.to_string(),
            token_count: tokens,
        })
    }

    /// Embed many texts, skipping blank ones, grouped `batch_size` per call
    ///
    /// Results keep the relative order of the surviving inputs.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String], options: BatchOptions) -> Result<BatchEmbeddingResult> {
        if options.batch_size == 0 {
            return Err(GatewayError::Validation(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        let start = Instant::now();
        let survivors: Vec<&String> = texts.iter().filter(|t| !t.trim().is_empty()).collect();
        if survivors.is_empty() {
            return Err(GatewayError::Validation(
                "No non-empty texts to embed".to_string(),
            ));
        }
        if survivors.len() < texts.len() {
            debug!("Skipped {} blank texts", texts.len() - survivors.len());
        }

        let groups: Vec<&[&String]> = survivors.chunks(options.batch_size).collect();
        let outcomes = if options.parallel {
            try_join_all(groups.iter().map(|group| self.embed_group(group))).await?
        } else {
            let mut outcomes = Vec::with_capacity(groups.len());
            for group in &groups {
                outcomes.push(self.embed_group(group).await?);
            }
            outcomes
        };

        let mut embeddings = Vec::with_capacity(survivors.len());
        let mut total_tokens = 0;
        for (results, tokens) in outcomes {
            embeddings.extend(results);
            total_tokens += tokens;
        }

        info!(
            "Embedded {} texts in {} groups ({} tokens)",
            embeddings.len(),
            groups.len(),
            total_tokens
        );

        Ok(BatchEmbeddingResult {
            embeddings,
            total_tokens,
            processing_time: start.elapsed(),
        })
    }

    /// Chunk a document and embed every chunk
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn embed_document(&self, text: &str, options: DocumentOptions) -> Result<DocumentEmbeddingResult> {
        let start = Instant::now();
        let chunker = TextChunker::new(options.chunk_size, options.overlap)?;
        let chunk_texts = chunker.chunk(text);
        if chunk_texts.is_empty() {
            return Err(GatewayError::Validation("Document cannot be empty".to_string()));
        }

        debug!("Document split into {} chunks", chunk_texts.len());

        let batch = self
            .embed_batch(
                &chunk_texts,
                BatchOptions {
                    batch_size: options.batch_size,
                    parallel: false,
                },
            )
            .await?;

        let chunks = batch
            .embeddings
            .into_iter()
            .enumerate()
            .map(|(chunk_index, result)| {
                let (start_offset, end_offset) = if options.include_metadata {
                    match locate(text, &result.text) {
                        Some((start, end)) => (Some(start), Some(end)),
                        None => (None, None),
                    }
                } else {
                    (None, None)
                };

                DocumentChunkEmbedding {
                    result,
                    chunk_index,
                    start_offset,
                    end_offset,
                }
            })
            .collect();

        Ok(DocumentEmbeddingResult {
            chunks,
            total_tokens: batch.total_tokens,
            processing_time: start.elapsed(),
        })
    }

    /// One unthrottled, single-attempt embedding call
    ///
    /// Succeeds whenever the provider answers; the vectors are not validated.
    pub async fn check_connectivity(&self) -> Result<()> {
        self.fetch_embeddings(
            vec![CONNECTIVITY_PROBE.to_string()],
            CallOptions::default().unthrottled().retries(1),
        )
        .await
        .map(|_| ())
    }

    async fn cached(&self, text: &str) -> Option<Vec<f32>> {
        match &self.cache {
            Some(cache) => cache.get(text).await,
            None => None,
        }
    }

    /// Embed one group; cache hits are served locally and count zero tokens
    async fn embed_group(&self, group: &[&String]) -> Result<(Vec<EmbeddingResult>, u32)> {
        let mut slots: Vec<Option<Vec<f32>>> = Vec::with_capacity(group.len());
        let mut misses = Vec::new();
        for text in group {
            let hit = self.cached(text).await;
            if hit.is_none() {
                misses.push((*text).clone());
            }
            slots.push(hit);
        }

        let mut fetched = Vec::new().into_iter();
        let mut tokens = 0;
        if !misses.is_empty() {
            let (vectors, reported) = self.request_embeddings(misses.clone(), CallOptions::default()).await?;
            tokens = if reported > 0 {
                reported
            } else {
                misses.iter().map(|t| self.estimator.estimate(t)).sum()
            };

            if let Some(cache) = &self.cache {
                for (text, vector) in misses.iter().zip(&vectors) {
                    cache.put(text, vector.clone()).await;
                }
            }
            fetched = vectors.into_iter();
        }

        let mut results = Vec::with_capacity(group.len());
        for (text, slot) in group.iter().zip(slots) {
            let (embedding, token_count) = match slot {
                Some(embedding) => (embedding, 0),
                None => {
                    let embedding = fetched.next().ok_or_else(|| {
                        GatewayError::MalformedResponse("Missing embedding in batch response".to_string())
                    })?;
                    (embedding, self.estimator.estimate(text))
                }
            };
            results.push(EmbeddingResult {
                embedding,
                text: (*text).clone(),
                token_count,
            });
        }

        Ok((results, tokens))
    }

    /// Issue one embedding request through the invoker and validate the vectors
    async fn request_embeddings(&self, input: Vec<String>, options: CallOptions) -> Result<(Vec<Vec<f32>>, u32)> {
        let expected = input.len();
        let response = self.fetch_embeddings(input, options).await?;

        let tokens = response
            .usage
            .as_ref()
            .and_then(|u| u.prompt_tokens.or(u.total_tokens))
            .unwrap_or(0);
        if let Some(metrics) = self.invoker.metrics() {
            metrics.record_tokens(tokens as u64, 0);
        }

        let vectors = self.validate_response(response, expected)?;
        Ok((vectors, tokens))
    }

    async fn fetch_embeddings(&self, input: Vec<String>, options: CallOptions) -> Result<EmbeddingResponse> {
        let request = Arc::new(EmbeddingRequest::new(self.deployment.clone(), input));
        let transport = self.transport.clone();

        self.invoker
            .call(
                "embeddings",
                move || {
                    let transport = transport.clone();
                    let request = request.clone();
                    async move { transport.embeddings(&request).await }
                },
                options,
            )
            .await
    }

    fn validate_response(&self, mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if response.data.is_empty() {
            return Err(GatewayError::MalformedResponse(
                "No embedding data returned".to_string(),
            ));
        }
        if response.data.len() != expected {
            return Err(GatewayError::MalformedResponse(format!(
                "Expected {} embeddings, got {}",
                expected,
                response.data.len()
            )));
        }

        response.data.sort_by_key(|d| d.index);

        response
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.config.dimension {
                    return Err(GatewayError::MalformedResponse(format!(
                        "Embedding has dimension {}, expected {}",
                        d.embedding.len(),
                        self.config.dimension
                    )));
                }
                Ok(d.embedding)
            })
            .collect()
    }
}

/// Character range of the first occurrence of `chunk` in `text`
fn locate(text: &str, chunk: &str) -> Option<(usize, usize)> {
    let byte_start = text.find(chunk)?;
    let start = text[..byte_start].chars().count();
    Some((start, start + chunk.chars().count()))
}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text).await?.embedding)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let options = BatchOptions {
            batch_size: self.config.batch_size,
            parallel: false,
        };
        let batch = self.embed_batch(texts, options).await?;
        Ok(batch.embeddings.into_iter().map(|e| e.embedding).collect())
    }

    async fn check_connectivity(&self) -> Result<()> {
        EmbeddingService::check_connectivity(self).await
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_reports_char_offsets() {
        let text = "héllo world. héllo again.";

        assert_eq!(locate(text, "world."), Some((6, 12)));
        assert_eq!(locate(text, "missing"), None);
    }

    #[test]
    fn test_locate_reports_first_occurrence() {
        let text = "repeat. repeat.";

        assert_eq!(locate(text, "repeat."), Some((0, 7)));
    }
}
