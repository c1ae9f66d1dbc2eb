//! Provider health probes

use crate::chat::{ChatCompletionOptions, ChatMessage, ChatService};
use crate::embedding::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TEXT: &str = "health check";

/// Health status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    pub status: HealthStatus,

    pub message: Option<String>,

    /// Response time in milliseconds
    pub response_time_ms: Option<u64>,
}

impl ComponentHealth {
    fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    fn not_configured(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Degraded,
            message: Some("Not configured".to_string()),
            response_time_ms: None,
        }
    }
}

/// Aggregated gateway health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    /// The provider answered a bare embedding call
    pub connectivity: bool,

    /// A throttled embedding returned a vector of the configured dimension
    pub embeddings: bool,

    /// A minimal chat completion returned content
    pub chat: bool,

    /// All of the above
    pub overall: bool,

    pub status: HealthStatus,

    pub components: Vec<ComponentHealth>,

    pub uptime_secs: u64,

    pub timestamp: i64,
}

#[derive(Debug, Clone)]
struct CachedHealth {
    result: GatewayHealth,
    cached_at: Instant,
}

/// Health checker with caching
pub struct HealthChecker {
    start_time: Instant,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    chat: Option<Arc<ChatService>>,
    cached_result: Arc<RwLock<Option<CachedHealth>>>,
    cache_ttl: Duration,
}

impl HealthChecker {
    /// Create a new health checker with default 30-second cache TTL
    pub fn new() -> Self {
        Self::with_cache_ttl(Duration::from_secs(30))
    }

    pub fn with_cache_ttl(cache_ttl: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            embeddings: None,
            chat: None,
            cached_result: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    pub fn with_embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn with_chat(mut self, chat: Arc<ChatService>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Check gateway health, reusing a result younger than the cache TTL
    pub async fn check_health(&self) -> GatewayHealth {
        {
            let cached = self.cached_result.read().await;
            if let Some(cached_health) = &*cached {
                if cached_health.cached_at.elapsed() < self.cache_ttl {
                    debug!("Returning cached health check result");
                    return cached_health.result.clone();
                }
            }
        }

        self.check_health_fresh().await
    }

    /// Force refresh health check (bypass cache)
    pub async fn check_health_fresh(&self) -> GatewayHealth {
        debug!("Performing fresh health check");
        let health = self.perform_health_check().await;

        let mut cached = self.cached_result.write().await;
        *cached = Some(CachedHealth {
            result: health.clone(),
            cached_at: Instant::now(),
        });

        health
    }

    async fn perform_health_check(&self) -> GatewayHealth {
        let connectivity = self.check_connectivity().await;
        let embeddings = self.check_embeddings().await;
        let chat = self.check_chat().await;

        let status = if connectivity.is_healthy() && embeddings.is_healthy() && chat.is_healthy() {
            HealthStatus::Healthy
        } else if connectivity.status == HealthStatus::Unhealthy {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        let health = GatewayHealth {
            connectivity: connectivity.is_healthy(),
            embeddings: embeddings.is_healthy(),
            chat: chat.is_healthy(),
            overall: status == HealthStatus::Healthy,
            status,
            components: vec![connectivity, embeddings, chat],
            uptime_secs: self.start_time.elapsed().as_secs(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        if !health.overall {
            warn!(
                "Gateway health {:?} (connectivity={}, embeddings={}, chat={})",
                health.status, health.connectivity, health.embeddings, health.chat
            );
        }

        health
    }

    async fn check_connectivity(&self) -> ComponentHealth {
        let Some(embeddings) = &self.embeddings else {
            return ComponentHealth::not_configured("connectivity");
        };

        probe("connectivity", async {
            embeddings
                .check_connectivity()
                .await
                .map(|_| "Provider reachable".to_string())
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn check_embeddings(&self) -> ComponentHealth {
        let Some(embeddings) = &self.embeddings else {
            return ComponentHealth::not_configured("embeddings");
        };

        probe("embeddings", async {
            let vector = embeddings.embed_text(PROBE_TEXT).await.map_err(|e| e.to_string())?;
            let dimension = embeddings.embedding_dimension();
            if vector.len() == dimension {
                Ok(format!("Embeddings operational (dim: {})", dimension))
            } else {
                Err(format!("Expected dimension {}, got {}", dimension, vector.len()))
            }
        })
        .await
    }

    async fn check_chat(&self) -> ComponentHealth {
        let Some(chat) = &self.chat else {
            return ComponentHealth::not_configured("chat");
        };

        let options = ChatCompletionOptions {
            max_tokens: 5,
            ..chat.default_options().clone()
        };
        probe("chat", async {
            chat.complete_with_options(&[ChatMessage::user("ping")], &options)
                .await
                .map(|_| "Chat operational".to_string())
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Simple liveness check
    pub fn liveness(&self) -> bool {
        true
    }

    /// Readiness check
    pub async fn readiness(&self) -> bool {
        self.check_health().await.status != HealthStatus::Unhealthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one probe under the timeout and time it
async fn probe<F>(name: &str, check: F) -> ComponentHealth
where
    F: Future<Output = std::result::Result<String, String>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(PROBE_TIMEOUT, check).await;
    let elapsed = start.elapsed().as_millis() as u64;

    let (status, message) = match outcome {
        Ok(Ok(message)) => (HealthStatus::Healthy, message),
        Ok(Err(message)) => (HealthStatus::Unhealthy, message),
        Err(_) => (HealthStatus::Unhealthy, "Health check timeout".to_string()),
    };

    ComponentHealth {
        name: name.to_string(),
        status,
        message: Some(message),
        response_time_ms: Some(elapsed),
    }
}
