//! Contract tests against the deterministic mock variant

use std::sync::Arc;

use futures::StreamExt;
use modelport_providers::{
    ChatRequest, CompletionRequest, ConnectionState, ConnectionStatusService, GenerationOptions,
    LlmProvider, Message, MockProvider, OfflineCache, ProviderError, Role, StreamEvent,
    OFFLINE_PLACEHOLDER,
};

fn mock() -> (
    MockProvider,
    Arc<ConnectionStatusService>,
    Arc<OfflineCache>,
) {
    let status = Arc::new(ConnectionStatusService::new());
    let cache = Arc::new(OfflineCache::new());
    let provider = MockProvider::new(Arc::clone(&status), Arc::clone(&cache));
    (provider, status, cache)
}

#[tokio::test]
async fn connect_is_idempotent() {
    let (provider, status, _) = mock();
    let mut rx = status.subscribe();

    provider.connect().await.unwrap();
    provider.connect().await.unwrap();

    assert_eq!(status.state(), ConnectionState::Connected);

    // Exactly one Connecting -> Connected pair; the second connect emitted
    // nothing.
    assert_eq!(rx.recv().await.unwrap().state, ConnectionState::Connecting);
    assert_eq!(rx.recv().await.unwrap().state, ConnectionState::Connected);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_while_disconnected_is_a_noop() {
    let (provider, status, _) = mock();
    provider.disconnect().await;
    assert_eq!(status.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn failed_connect_lands_in_error_and_retry_recovers() {
    let (provider, status, _) = mock();

    provider.fail_connect(true);
    let err = provider.connect().await.unwrap_err();
    assert!(matches!(err, ProviderError::ConnectionFailed(_)));
    assert_eq!(status.state(), ConnectionState::Error);

    provider.fail_connect(false);
    provider.connect().await.unwrap();
    assert_eq!(status.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn completion_requires_connection() {
    let (provider, _, _) = mock();
    let err = provider
        .generate_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn completion_echoes_and_caches() {
    let (provider, _, cache) = mock();
    provider.connect().await.unwrap();

    let response = provider
        .generate_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap();

    assert_eq!(response.content, "Mock response for: Hello");
    assert!(response.usage.is_some());
    assert_eq!(
        cache.cached_response("Hello").await.as_deref(),
        Some("Mock response for: Hello")
    );
}

#[tokio::test]
async fn chat_flattens_to_role_prefixed_prompt() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    let response = provider
        .generate_chat_completion(ChatRequest {
            model: "model1".to_string(),
            messages: vec![
                Message::new(Role::System, "Be brief."),
                Message::new(Role::User, "Hi"),
            ],
            options: GenerationOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(
        response.content,
        "Mock response for: System: Be brief.\n\nUser: Hi"
    );
}

#[tokio::test]
async fn stream_reconstructs_full_response_with_one_terminal_event() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    let events: Vec<StreamEvent> = provider
        .stream_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.iter().filter(|e| e.done).count(), 1);
    assert!(events.last().unwrap().done);

    let rebuilt: String = events.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(rebuilt, "Mock response for: Hello");
}

#[tokio::test]
async fn concurrent_streams_do_not_interleave() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    let a = provider
        .stream_completion(CompletionRequest::new("model1", "alpha"))
        .await
        .unwrap();
    let b = provider
        .stream_completion(CompletionRequest::new("model1", "beta"))
        .await
        .unwrap();

    let (a_events, b_events) =
        futures::join!(a.collect::<Vec<_>>(), b.collect::<Vec<_>>());

    let a_text: String = a_events.iter().map(|e| e.content.as_str()).collect();
    let b_text: String = b_events.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(a_text, "Mock response for: alpha");
    assert_eq!(b_text, "Mock response for: beta");
}

#[tokio::test]
async fn offline_mode_prefers_exact_cache_hit() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    provider
        .generate_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap();

    provider.set_offline_mode(true);
    let offline = provider
        .generate_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap();
    assert_eq!(offline.content, "Mock response for: Hello");
}

#[tokio::test]
async fn offline_miss_falls_back_to_last_response_then_placeholder() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();
    provider.set_offline_mode(true);

    // Nothing ever cached: fixed placeholder, not an error.
    let empty = provider
        .generate_completion(CompletionRequest::new("model1", "never seen"))
        .await
        .unwrap();
    assert_eq!(empty.content, OFFLINE_PLACEHOLDER);

    provider.set_offline_mode(false);
    provider
        .generate_completion(CompletionRequest::new("model1", "known"))
        .await
        .unwrap();

    provider.set_offline_mode(true);
    let fallback = provider
        .generate_completion(CompletionRequest::new("model1", "still never seen"))
        .await
        .unwrap();
    assert_eq!(fallback.content, "Mock response for: known");
}

#[tokio::test]
async fn offline_streaming_replays_cached_text() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    provider
        .generate_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap();
    provider.set_offline_mode(true);

    let events: Vec<StreamEvent> = provider
        .stream_completion(CompletionRequest::new("model1", "Hello"))
        .await
        .unwrap()
        .collect()
        .await;

    let rebuilt: String = events.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(rebuilt, "Mock response for: Hello");
    assert!(events.last().unwrap().done);
}

#[tokio::test]
async fn model_lookup() {
    let (provider, _, _) = mock();
    provider.connect().await.unwrap();

    let models = provider.available_models().await.unwrap();
    assert_eq!(models.len(), 2);

    let info = provider.model_info("model1").await.unwrap();
    assert_eq!(info.context_size, Some(4096));

    let err = provider.model_info("nope").await.unwrap_err();
    assert_eq!(err, ProviderError::ModelNotFound("nope".to_string()));
}

#[tokio::test]
async fn disconnect_clears_session() {
    let (provider, status, _) = mock();
    provider.connect().await.unwrap();
    provider.disconnect().await;

    assert_eq!(status.state(), ConnectionState::Disconnected);
    assert!(provider.available_models().await.is_err());
}
