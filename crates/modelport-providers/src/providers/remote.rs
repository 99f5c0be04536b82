//! Remote API provider
//!
//! Talks to an OpenAI-compatible HTTPS endpoint: `/models` for the catalog,
//! `/chat/completions` for generation, streamed as server-sent events.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cache::OfflineCache,
    error::ProviderError,
    models::{
        flatten_messages, CompletionResponse, Message, ModelInfo, Role, StreamEvent, TokenUsage,
    },
    provider::{ChatRequest, CompletionRequest, LlmProvider, ProviderKind},
    status::ConnectionStatusService,
    streaming::{drain_lines, stream_from_text, CompletionStream},
};

/// Provider variant backed by a hosted OpenAI-compatible API.
pub struct RemoteProvider {
    client: Client,
    base_url: String,
    api_key: String,
    status: Arc<ConnectionStatusService>,
    cache: Arc<OfflineCache>,
    connected: Arc<AtomicBool>,
    offline: AtomicBool,
    models: RwLock<Vec<ModelInfo>>,
}

impl RemoteProvider {
    /// Create a provider for `base_url` authenticated with `api_key`
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        status: Arc<ConnectionStatusService>,
        cache: Arc<OfflineCache>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::Validation(
                "remote provider API key is required".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            status,
            cache,
            connected: Arc::new(AtomicBool::new(false)),
            offline: AtomicBool::new(false),
            models: RwLock::new(Vec::new()),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn ensure_connected(&self) -> Result<(), ProviderError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::ProviderUnavailable(
                "remote provider is not connected".to_string(),
            ))
        }
    }

    fn transport_failure(&self, err: reqwest::Error) -> ProviderError {
        warn!(error = %err, "transport failure, marking session errored");
        self.connected.store(false, Ordering::SeqCst);
        self.status.mark_error();
        ProviderError::RequestFailed(err.to_string())
    }

    /// Turn a prompt-style request into the wire conversation
    fn prompt_messages(request: &CompletionRequest) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(Message::new(Role::System, system.clone()));
        }
        messages.push(Message::new(Role::User, request.prompt.clone()));
        messages
    }

    async fn post_chat_completions(
        &self,
        request: &ChatWireRequest<'_>,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.auth_header())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "remote backend returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &crate::options::GenerationOptions,
        cache_key: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        let wire = ChatWireRequest::new(model, messages, options, false);
        let response = self.post_chat_completions(&wire).await?;

        let body: ChatWireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .ok_or_else(|| {
                ProviderError::RequestFailed("no content in backend response".to_string())
            })?;

        self.cache.cache_response(cache_key, &content).await;

        Ok(CompletionResponse {
            content,
            usage: body.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
        options: &crate::options::GenerationOptions,
        cache_key: String,
    ) -> Result<CompletionStream, ProviderError> {
        let wire = ChatWireRequest::new(model, messages, options, true);
        let response = self.post_chat_completions(&wire).await?;

        let cache = Arc::clone(&self.cache);
        let status = Arc::clone(&self.status);
        let connected = Arc::clone(&self.connected);

        Ok(Box::pin(async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();
            let mut full = String::new();
            let mut finished = false;

            'transport: while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(data) => {
                        buf.extend_from_slice(&data);
                        for line in drain_lines(&mut buf) {
                            let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
                                continue;
                            };

                            if payload == "[DONE]" {
                                cache.cache_response(&cache_key, &full).await;
                                finished = true;
                                yield StreamEvent::finished("");
                                break 'transport;
                            }

                            match serde_json::from_str::<SseChunk>(payload) {
                                Ok(chunk) => {
                                    let delta = chunk
                                        .choices
                                        .into_iter()
                                        .next()
                                        .and_then(|c| c.delta)
                                        .and_then(|d| d.content)
                                        .unwrap_or_default();
                                    if !delta.is_empty() {
                                        full.push_str(&delta);
                                        yield StreamEvent::delta(delta);
                                    }
                                }
                                Err(_) => warn!("skipping unparseable SSE payload"),
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "transport failure mid-stream");
                        connected.store(false, Ordering::SeqCst);
                        status.mark_error();
                        finished = true;
                        yield StreamEvent::finished("");
                        break 'transport;
                    }
                }
            }

            if !finished {
                cache.cache_response(&cache_key, &full).await;
                yield StreamEvent::finished("");
            }
        }))
    }
}

#[async_trait]
impl LlmProvider for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    fn name(&self) -> &str {
        "Remote"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.status.begin_connect(self.name());
        debug!(base_url = %self.base_url, "connecting to remote API");

        let result = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(err) => {
                self.status.mark_error();
                return Err(ProviderError::ConnectionFailed(err.to_string()));
            }
        };

        let http_status = response.status();
        if http_status == reqwest::StatusCode::UNAUTHORIZED
            || http_status == reqwest::StatusCode::FORBIDDEN
        {
            self.status.mark_error();
            // Deliberately terse: never echo credential material.
            return Err(ProviderError::ConnectionFailed(
                "authentication failed".to_string(),
            ));
        }
        if !http_status.is_success() {
            self.status.mark_error();
            return Err(ProviderError::ConnectionFailed(format!(
                "remote backend returned {http_status}"
            )));
        }

        let listing: ModelsWireResponse = match response.json().await {
            Ok(l) => l,
            Err(err) => {
                self.status.mark_error();
                return Err(ProviderError::ConnectionFailed(err.to_string()));
            }
        };

        let models = listing
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id.clone(),
                id: m.id,
                provider: "remote".to_string(),
                description: "Hosted model".to_string(),
                tags: Vec::new(),
                context_size: None,
                parameters: Default::default(),
            })
            .collect();

        *self.models.write().expect("models lock poisoned") = models;
        self.connected.store(true, Ordering::SeqCst);
        self.status.mark_connected(None);
        info!(base_url = %self.base_url, "remote provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.models.write().expect("models lock poisoned").clear();
            self.status.mark_disconnected();
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.ensure_connected()?;
        Ok(self.models.read().expect("models lock poisoned").clone())
    }

    async fn model_info(&self, id: &str) -> Result<ModelInfo, ProviderError> {
        self.models
            .read()
            .expect("models lock poisoned")
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::ModelNotFound(id.to_string()))
    }

    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Ok(CompletionResponse {
                content: self.cache.resolve_offline(&request.prompt).await,
                usage: None,
            });
        }
        self.ensure_connected()?;

        let messages = Self::prompt_messages(&request);
        self.complete(&request.model, &messages, &request.options, &request.prompt)
            .await
    }

    async fn generate_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let cache_key = flatten_messages(&request.messages);

        if self.offline.load(Ordering::SeqCst) {
            return Ok(CompletionResponse {
                content: self.cache.resolve_offline(&cache_key).await,
                usage: None,
            });
        }
        self.ensure_connected()?;

        self.complete(&request.model, &request.messages, &request.options, &cache_key)
            .await
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            let replay = self.cache.resolve_offline(&request.prompt).await;
            return Ok(stream_from_text(replay));
        }
        self.ensure_connected()?;

        let messages = Self::prompt_messages(&request);
        self.stream(&request.model, &messages, &request.options, request.prompt.clone())
            .await
    }

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, ProviderError> {
        let cache_key = flatten_messages(&request.messages);

        if self.offline.load(Ordering::SeqCst) {
            let replay = self.cache.resolve_offline(&cache_key).await;
            return Ok(stream_from_text(replay));
        }
        self.ensure_connected()?;

        self.stream(&request.model, &request.messages, &request.options, cache_key)
            .await
    }

    fn set_offline_mode(&self, enabled: bool) {
        debug!(enabled, "remote provider offline mode");
        self.offline.store(enabled, Ordering::SeqCst);
    }
}

#[derive(Serialize)]
struct ChatWireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

impl<'a> ChatWireRequest<'a> {
    fn new(
        model: &'a str,
        messages: &'a [Message],
        options: &crate::options::GenerationOptions,
        stream: bool,
    ) -> Self {
        Self {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop_sequences.clone(),
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatWireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct SseChunk {
    choices: Vec<SseChoice>,
}

#[derive(Deserialize)]
struct SseChoice {
    delta: Option<SseDelta>,
}

#[derive(Deserialize)]
struct SseDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsWireResponse {
    #[serde(default)]
    data: Vec<ModelsWireEntry>,
}

#[derive(Deserialize)]
struct ModelsWireEntry {
    id: String,
}
