//! Chat completion and streaming tests against the scripted transport

mod common;

use ai_gateway::chat::{ChatCompletionOptions, ChatMessage, Role, StreamingChatResult, TokenUsage};
use ai_gateway::error::ErrorKind;
use ai_gateway::AiGateway;
use common::{test_config, MockTransport};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready_ok};

fn gateway_with(transport: Arc<MockTransport>) -> AiGateway {
    AiGateway::with_transport(test_config(), transport).unwrap()
}

#[tokio::test]
async fn test_empty_messages_never_reach_transport() {
    let transport = Arc::new(MockTransport::default());
    let gateway = gateway_with(transport.clone());
    let chat = gateway.chat();

    let err = chat.complete(&[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = chat.stream_complete(&[]).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_complete_returns_reply_and_usage() {
    let transport = Arc::new(MockTransport::default());
    let gateway = gateway_with(transport.clone());

    let result = gateway
        .chat()
        .complete(&[ChatMessage::system("Be brief."), ChatMessage::user("Hi")])
        .await
        .unwrap();

    assert_eq!(result.message, "Hello from the assistant");
    assert_eq!(result.role, Role::Assistant);
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert_eq!(result.usage.total_tokens, 15);
    assert_eq!(result.model, "gpt-test");

    let request = transport.last_chat_request().unwrap();
    assert_eq!(request.deployment, "chat-dep");
    assert_eq!(request.messages.len(), 2);
    assert!(!request.stream);
    assert_eq!(request.max_tokens, 800);
}

#[tokio::test]
async fn test_custom_options_are_forwarded() {
    let transport = Arc::new(MockTransport::default());
    let gateway = gateway_with(transport.clone());
    let options = ChatCompletionOptions {
        max_tokens: 42,
        temperature: 0.1,
        stop: vec!["END".to_string()],
        ..ChatCompletionOptions::default()
    };

    gateway
        .chat()
        .complete_with_options(&[ChatMessage::user("Hi")], &options)
        .await
        .unwrap();

    let request = transport.last_chat_request().unwrap();
    assert_eq!(request.max_tokens, 42);
    assert_eq!(request.stop, vec!["END".to_string()]);
}

#[tokio::test]
async fn test_missing_choices_is_malformed_without_retry() {
    let transport = Arc::new(MockTransport {
        omit_choices: true,
        ..MockTransport::default()
    });
    let gateway = gateway_with(transport.clone());

    let err = gateway
        .chat()
        .complete(&[ChatMessage::user("Hi")])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert_eq!(transport.chat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_chat_failure_is_retried() {
    let transport = Arc::new(MockTransport {
        failures_before_success: 1,
        ..MockTransport::default()
    });
    let gateway = gateway_with(transport.clone());

    let result = gateway.chat().complete(&[ChatMessage::user("Hi")]).await.unwrap();

    assert_eq!(result.message, "Hello from the assistant");
    assert_eq!(transport.chat_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_usage_resolves_only_after_drain() {
    let transport = Arc::new(MockTransport::default());
    let gateway = gateway_with(transport.clone());

    let StreamingChatResult { mut stream, usage } = gateway
        .chat()
        .stream_complete(&[ChatMessage::user("abcdefgh")])
        .await
        .unwrap();
    let mut usage = tokio_test::task::spawn(usage);

    let mut text = String::new();
    let mut terminal = None;
    while let Some(entry) = stream.next().await {
        let entry = entry.unwrap();
        if entry.is_terminal() {
            terminal = Some(entry);
            break;
        }
        assert_pending!(usage.poll());
        text.push_str(entry.content.as_deref().unwrap());
    }

    assert_eq!(text, "Hello!");
    let terminal = terminal.unwrap();
    assert_eq!(terminal.content, None);
    assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));

    // Provider omits usage: prompt estimated at 4 chars/token, one token per fragment
    let usage = assert_ready_ok!(usage.poll());
    assert_eq!(usage, TokenUsage::new(2, 3));

    assert!(transport.last_chat_request().unwrap().stream);
}

#[tokio::test]
async fn test_abandoned_stream_leaves_usage_pending() {
    let transport = Arc::new(MockTransport::default());
    let gateway = gateway_with(transport);

    let StreamingChatResult { mut stream, usage } = gateway
        .chat()
        .stream_complete(&[ChatMessage::user("Hi")])
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content.as_deref(), Some("Hel"));

    let waited = tokio::time::timeout(Duration::from_millis(100), usage).await;
    assert!(waited.is_err(), "usage resolved before the stream was drained");
}

#[tokio::test]
async fn test_stream_open_failure_is_retried() {
    let transport = Arc::new(MockTransport {
        failures_before_success: 2,
        ..MockTransport::default()
    });
    let gateway = gateway_with(transport.clone());

    let (text, usage) = gateway
        .chat()
        .stream_complete(&[ChatMessage::user("Hi")])
        .await
        .unwrap()
        .collect_text()
        .await
        .unwrap();

    assert_eq!(text, "Hello!");
    assert_eq!(usage.completion_tokens, 3);
    assert_eq!(transport.stream_calls.load(Ordering::SeqCst), 3);
}
