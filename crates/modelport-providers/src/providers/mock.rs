//! Deterministic in-process provider used by tests and demos

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;

use crate::{
    cache::OfflineCache,
    error::ProviderError,
    models::{flatten_messages, CompletionResponse, ModelInfo, TokenUsage},
    options::GenerationOptions,
    provider::{ChatRequest, CompletionRequest, LlmProvider, ProviderKind},
    status::ConnectionStatusService,
    streaming::{stream_from_text, CompletionStream},
};

/// Test double implementing the full contract with deterministic output.
///
/// Completions echo `Mock response for: <prompt>`; streaming tokenizes the
/// same text into whitespace-inclusive deltas. Failure injection flags drive
/// the error-path tests.
pub struct MockProvider {
    status: Arc<ConnectionStatusService>,
    cache: Arc<OfflineCache>,
    connected: AtomicBool,
    offline: AtomicBool,
    fail_connect: AtomicBool,
    fail_requests: AtomicBool,
    models: Vec<ModelInfo>,
}

impl MockProvider {
    /// Create a mock provider wired to the shared status service and cache
    pub fn new(status: Arc<ConnectionStatusService>, cache: Arc<OfflineCache>) -> Self {
        Self {
            status,
            cache,
            connected: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_requests: AtomicBool::new(false),
            models: default_models(),
        }
    }

    /// Make the next `connect()` calls fail
    pub fn fail_connect(&self, enabled: bool) {
        self.fail_connect.store(enabled, Ordering::SeqCst);
    }

    /// Make request calls fail with `RequestFailed`
    pub fn fail_requests(&self, enabled: bool) {
        self.fail_requests.store(enabled, Ordering::SeqCst);
    }

    fn render(prompt: &str) -> String {
        format!("Mock response for: {prompt}")
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Ok(CompletionResponse {
                content: self.cache.resolve_offline(prompt).await,
                usage: None,
            });
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(ProviderError::ProviderUnavailable(
                "mock provider is not connected".to_string(),
            ));
        }

        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ProviderError::RequestFailed(
                "injected request failure".to_string(),
            ));
        }

        let content = Self::render(prompt);
        self.cache.cache_response(prompt, &content).await;

        let prompt_tokens = prompt.split_whitespace().count() as u32;
        let completion_tokens = content.split_whitespace().count() as u32;
        Ok(CompletionResponse {
            content,
            usage: Some(TokenUsage {
                prompt_tokens: Some(prompt_tokens),
                completion_tokens: Some(completion_tokens),
                total_tokens: Some(prompt_tokens.saturating_add(completion_tokens)),
            }),
        })
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.status.begin_connect(self.name());
        if self.fail_connect.load(Ordering::SeqCst) {
            self.status.mark_error();
            return Err(ProviderError::ConnectionFailed(
                "injected connect failure".to_string(),
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        self.status.mark_connected(None);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.status.mark_disconnected();
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ProviderError::ProviderUnavailable(
                "mock provider is not connected".to_string(),
            ));
        }
        Ok(self.models.clone())
    }

    async fn model_info(&self, id: &str) -> Result<ModelInfo, ProviderError> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::ModelNotFound(id.to_string()))
    }

    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.complete(&request.prompt, &request.options).await
    }

    async fn generate_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        // No native chat mode: flatten to a role-prefixed prompt.
        let prompt = flatten_messages(&request.messages);
        self.complete(&prompt, &request.options).await
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, ProviderError> {
        let response = self.complete(&request.prompt, &request.options).await?;
        Ok(stream_from_text(response.content))
    }

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, ProviderError> {
        let response = self.generate_chat_completion(request).await?;
        Ok(stream_from_text(response.content))
    }

    fn set_offline_mode(&self, enabled: bool) {
        self.offline.store(enabled, Ordering::SeqCst);
    }
}

fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "model1".to_string(),
            name: "Mock Model 1".to_string(),
            provider: "mock".to_string(),
            description: "Small deterministic test model".to_string(),
            tags: vec!["chat".to_string(), "7b".to_string()],
            context_size: Some(4096),
            parameters: [(
                "parameter_count_b".to_string(),
                serde_json::Value::from(7.0),
            )]
            .into_iter()
            .collect(),
        },
        ModelInfo {
            id: "model2".to_string(),
            name: "Mock Model 2".to_string(),
            provider: "mock".to_string(),
            description: "Larger deterministic test model".to_string(),
            tags: vec!["chat".to_string(), "13b".to_string()],
            context_size: Some(8192),
            parameters: [(
                "parameter_count_b".to_string(),
                serde_json::Value::from(13.0),
            )]
            .into_iter()
            .collect(),
        },
    ]
}
