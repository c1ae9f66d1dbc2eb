//! Integration tests for AI Gateway
//!
//! These tests require a live Azure OpenAI resource configured through:
//! - AZURE_OPENAI_ENDPOINT
//! - AZURE_OPENAI_API_KEY
//! - AZURE_OPENAI_API_VERSION
//! - AZURE_OPENAI_CHAT_DEPLOYMENT
//! - AZURE_OPENAI_EMBEDDING_DEPLOYMENT
//!
//! To run these tests:
//! `cargo test --test integration_test -- --ignored`

use ai_gateway::{
    chat::{ChatMessage, PromptTemplate},
    embedding::{cosine_similarity, BatchOptions, DocumentOptions},
    AiGateway,
};
use futures::StreamExt;
use std::collections::HashMap;

/// Build a gateway from the environment, or skip when it is not configured
fn live_gateway() -> Option<AiGateway> {
    match AiGateway::from_env() {
        Ok(gateway) => Some(gateway),
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            None
        }
    }
}

#[tokio::test]
#[ignore] // Requires Azure OpenAI credentials
async fn test_live_embeddings() {
    let Some(gateway) = live_gateway() else { return };
    let embeddings = gateway.embeddings();

    let cat = embeddings.embed("The cat sat on the mat.").await.unwrap();
    let kitten = embeddings.embed("A kitten rested on the rug.").await.unwrap();
    let invoice = embeddings.embed("Invoice 4471 is due on Friday.").await.unwrap();

    assert_eq!(cat.embedding.len(), gateway.config().embedding.dimension);

    let close = cosine_similarity(&cat.embedding, &kitten.embedding).unwrap();
    let far = cosine_similarity(&cat.embedding, &invoice.embedding).unwrap();
    assert!(close > far);
}

#[tokio::test]
#[ignore] // Requires Azure OpenAI credentials
async fn test_live_batch_and_document() {
    let Some(gateway) = live_gateway() else { return };
    let embeddings = gateway.embeddings();

    let texts = vec!["alpha".to_string(), "".to_string(), "beta".to_string()];
    let batch = embeddings.embed_batch(&texts, BatchOptions::default()).await.unwrap();
    assert_eq!(batch.embeddings.len(), 2);
    assert!(batch.total_tokens > 0);

    let document = "Our platform ingests events in real time. ".repeat(400);
    let result = embeddings
        .embed_document(
            &document,
            DocumentOptions {
                chunk_size: 2000,
                overlap: 100,
                include_metadata: true,
                ..DocumentOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(result.chunks.len() > 1);
}

#[tokio::test]
#[ignore] // Requires Azure OpenAI credentials
async fn test_live_streaming_session() {
    let Some(gateway) = live_gateway() else { return };
    let session = gateway.session(PromptTemplate::default()).with_context(HashMap::from([
        ("prospect_name".to_string(), "Ada".to_string()),
        ("company".to_string(), "Acme".to_string()),
        ("product".to_string(), "the analytics suite".to_string()),
    ]));

    let reply = session.send("Say hello in five words.").await.unwrap();
    assert!(!reply.message.is_empty());

    let streaming = session.send_streaming("Now say goodbye.").await.unwrap();
    let mut stream = streaming.stream;
    let mut saw_terminal = false;
    while let Some(entry) = stream.next().await {
        saw_terminal |= entry.unwrap().is_terminal();
    }
    let usage = streaming.usage.await.unwrap();

    assert!(saw_terminal);
    assert!(usage.total_tokens > 0);
    assert_eq!(session.history_len(), 4);
}

#[tokio::test]
#[ignore] // Requires Azure OpenAI credentials
async fn test_live_health() {
    let Some(gateway) = live_gateway() else { return };

    let health = gateway.health_checker().check_health_fresh().await;
    assert!(health.connectivity);
    assert!(health.overall, "{:?}", health.components);

    let chat = gateway.chat();
    let result = chat.complete(&[ChatMessage::user("ping")]).await.unwrap();
    assert!(result.usage.total_tokens > 0);
}
