//! HTTP transport for Azure OpenAI deployments

use super::{models::*, ChatChunkStream, ProviderTransport};
use crate::config::ProviderConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

/// Client for an Azure OpenAI resource
pub struct AzureOpenAiClient {
    config: ProviderConfig,
    http_client: Client,
}

impl AzureOpenAiClient {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(GatewayError::from)?;

        info!(
            "Initialized provider client for {} (api-version {})",
            config.endpoint, config.api_version
        );

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create client with custom HTTP client
    pub fn with_http_client(config: ProviderConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            operation
        )
    }

    async fn post<B: serde::Serialize>(&self, url: &str, body: &B) -> Result<Response> {
        let response = self.http_client
            .post(url)
            .query(&[("api-version", self.config.api_version.as_str())])
            .header("api-key", self.config.api_key())
            .json(body)
            .send()
            .await
            .map_err(GatewayError::from)?;

        check_status(response).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        let response = self.post(url, body).await?;
        let bytes = response.bytes().await.map_err(GatewayError::from)?;

        serde_json::from_slice(&bytes).map_err(|e| {
            error!("Failed to decode provider response: {}", e);
            GatewayError::from(e)
        })
    }
}

/// Map non-success statuses to provider errors carrying the status code
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            debug!("Could not read error body for status {}: {}", status, e);
            String::new()
        }
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("Provider rate limit exceeded");
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("Provider authentication failed");
        }
        _ => {
            error!("Provider request failed with status {}: {}", status, error_text);
        }
    }

    Err(GatewayError::provider(
        format!("Status {}: {}", status, error_text),
        Some(status.as_u16()),
    ))
}

#[async_trait]
impl ProviderTransport for AzureOpenAiClient {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        debug!("Sending chat completion to deployment {}", request.deployment);
        let url = self.url(&request.deployment, "chat/completions");
        self.post_json(&url, request).await
    }

    async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<ChatChunkStream> {
        debug!("Opening chat completion stream on deployment {}", request.deployment);
        let url = self.url(&request.deployment, "chat/completions");
        let response = self.post(&url, request).await?;

        Ok(Box::pin(decode_sse(response.bytes_stream())))
    }

    async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        debug!(
            "Requesting {} embeddings from deployment {}",
            request.input.len(),
            request.deployment
        );
        let url = self.url(&request.deployment, "embeddings");
        self.post_json(&url, request).await
    }
}

/// Decode a server-sent event body into completion chunks
///
/// Bytes are buffered until a full line arrives, so characters split across
/// network reads decode intact.
fn decode_sse<S, B, E>(body: S) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Send,
    GatewayError: From<E>,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(GatewayError::from)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();

                match parse_sse_line(utf8_line(&line)?.trim())? {
                    SseLine::Chunk(parsed) => yield parsed,
                    SseLine::Done => {
                        done = true;
                        break 'read;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        if !done {
            if let SseLine::Chunk(parsed) = parse_sse_line(utf8_line(&buffer)?.trim())? {
                yield parsed;
            }
        }
    }
}

fn utf8_line(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        GatewayError::MalformedResponse(format!("Stream line is not valid UTF-8: {}", e))
    })
}

enum SseLine {
    Chunk(ChatCompletionChunk),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseLine> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };

    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    Ok(SseLine::Chunk(serde_json::from_str(data)?))
}
