//! Local inference provider
//!
//! Talks to an Ollama-compatible daemon over HTTP. Model listing comes from
//! `/api/tags`; completions from `/api/generate` and chat from `/api/chat`,
//! both streamed as newline-delimited JSON.

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
    models::{flatten_messages, CompletionResponse, Message, ModelInfo, StreamEvent, TokenUsage},
    options::GenerationOptions,
    provider::{ChatRequest, CompletionRequest, LlmProvider, ProviderKind},
    status::ConnectionStatusService,
    streaming::{drain_lines, stream_from_text, CompletionStream},
};

/// Default endpoint of the local inference daemon
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434";

/// Provider variant backed by a local inference daemon.
pub struct LocalProvider {
    client: Client,
    base_url: String,
    status: Arc<ConnectionStatusService>,
    cache: Arc<OfflineCache>,
    connected: Arc<AtomicBool>,
    offline: AtomicBool,
    models: RwLock<Vec<ModelInfo>>,
}

impl LocalProvider {
    /// Create a provider against `base_url`
    pub fn new(
        base_url: impl Into<String>,
        status: Arc<ConnectionStatusService>,
        cache: Arc<OfflineCache>,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ProviderError::Validation(
                "local provider base URL is required".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            status,
            cache,
            connected: Arc::new(AtomicBool::new(false)),
            offline: AtomicBool::new(false),
            models: RwLock::new(Vec::new()),
        })
    }

    /// Create a provider against the default localhost endpoint
    pub fn with_default_endpoint(
        status: Arc<ConnectionStatusService>,
        cache: Arc<OfflineCache>,
    ) -> Result<Self, ProviderError> {
        Self::new(DEFAULT_LOCAL_ENDPOINT, status, cache)
    }

    fn ensure_connected(&self) -> Result<(), ProviderError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::ProviderUnavailable(
                "local provider is not connected".to_string(),
            ))
        }
    }

    /// A transport failure during a request is fatal to the session:
    /// Connected -> Error, and the caller gets `RequestFailed`.
    fn transport_failure(&self, err: reqwest::Error) -> ProviderError {
        warn!(error = %err, "transport failure, marking session errored");
        self.connected.store(false, Ordering::SeqCst);
        self.status.mark_error();
        ProviderError::RequestFailed(err.to_string())
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, reqwest::Error> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let tags: TagsResponse = response.json().await?;

        Ok(tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(ModelInfo::from)
            .collect())
    }

    async fn post_generate(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system_prompt.as_deref(),
            stream,
            options: BackendOptions::from(&request.options),
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "local backend returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn post_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let body = BackendChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            options: BackendOptions::from(&request.options),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "local backend returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    fn ndjson_stream(
        &self,
        response: reqwest::Response,
        cache_key: String,
        extract: fn(&str) -> Option<(String, bool)>,
    ) -> CompletionStream {
        let cache = Arc::clone(&self.cache);
        let status = Arc::clone(&self.status);
        let connected = Arc::clone(&self.connected);

        Box::pin(async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();
            let mut full = String::new();
            let mut finished = false;

            'transport: while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(data) => {
                        buf.extend_from_slice(&data);
                        for line in drain_lines(&mut buf) {
                            let Some((delta, done)) = extract(&line) else {
                                warn!("skipping unparseable stream line");
                                continue;
                            };

                            if done {
                                full.push_str(&delta);
                                cache.cache_response(&cache_key, &full).await;
                                finished = true;
                                yield StreamEvent::finished(delta);
                                break 'transport;
                            }
                            if !delta.is_empty() {
                                full.push_str(&delta);
                                yield StreamEvent::delta(delta);
                            }
                        }
                    }
                    Err(err) => {
                        // Mid-stream failure still terminates with done=true
                        // so consumers are never left hanging.
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
                // Backend closed without a done marker.
                cache.cache_response(&cache_key, &full).await;
                yield StreamEvent::finished("");
            }
        })
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn name(&self) -> &str {
        "Local"
    }

    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.status.begin_connect(self.name());
        debug!(base_url = %self.base_url, "connecting to local inference daemon");

        match self.fetch_models().await {
            Ok(mut models) => {
                if models.is_empty() {
                    debug!("daemon reported no models, using built-in catalog");
                    models = default_local_models();
                }
                *self.models.write().expect("models lock poisoned") = models;
                self.connected.store(true, Ordering::SeqCst);
                self.status.mark_connected(None);
                info!(base_url = %self.base_url, "local provider connected");
                Ok(())
            }
            Err(err) => {
                self.status.mark_error();
                Err(ProviderError::ConnectionFailed(err.to_string()))
            }
        }
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

        let response = self.post_generate(&request, false).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        self.cache
            .cache_response(&request.prompt, &chunk.response)
            .await;

        Ok(CompletionResponse {
            usage: usage_from_counts(chunk.prompt_eval_count, chunk.eval_count),
            content: chunk.response,
        })
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

        let response = self.post_chat(&request, false).await?;
        let chunk: ChatChunk = response
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let content = chunk.message.map(|m| m.content).unwrap_or_default();
        self.cache.cache_response(&cache_key, &content).await;

        Ok(CompletionResponse {
            usage: usage_from_counts(chunk.prompt_eval_count, chunk.eval_count),
            content,
        })
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

        let response = self.post_generate(&request, true).await?;
        Ok(self.ndjson_stream(response, request.prompt, parse_generate_line))
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

        let response = self.post_chat(&request, true).await?;
        Ok(self.ndjson_stream(response, cache_key, parse_chat_line))
    }

    fn set_offline_mode(&self, enabled: bool) {
        debug!(enabled, "local provider offline mode");
        self.offline.store(enabled, Ordering::SeqCst);
    }
}

fn usage_from_counts(prompt: Option<u32>, completion: Option<u32>) -> Option<TokenUsage> {
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: match (prompt, completion) {
            (Some(p), Some(c)) => Some(p.saturating_add(c)),
            _ => None,
        },
    })
}

fn parse_generate_line(line: &str) -> Option<(String, bool)> {
    let chunk: GenerateChunk = serde_json::from_str(line).ok()?;
    Some((chunk.response, chunk.done))
}

fn parse_chat_line(line: &str) -> Option<(String, bool)> {
    let chunk: ChatChunk = serde_json::from_str(line).ok()?;
    Some((
        chunk.message.map(|m| m.content).unwrap_or_default(),
        chunk.done,
    ))
}

/// Built-in catalog served when the daemon lists nothing
fn default_local_models() -> Vec<ModelInfo> {
    ["llama3:8b", "mistral:7b"]
        .into_iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: id.to_string(),
            provider: "local".to_string(),
            description: "Built-in default model".to_string(),
            tags: vec!["chat".to_string()],
            context_size: Some(8192),
            parameters: Default::default(),
        })
        .collect()
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: BackendOptions,
}

#[derive(Serialize)]
struct BackendChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: BackendOptions,
}

#[derive(Serialize)]
struct BackendOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl From<&GenerationOptions> for BackendOptions {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            num_predict: options.max_tokens,
            stop: options.stop_sequences.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    #[allow(dead_code)]
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagModel>>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    details: Option<TagDetails>,
}

#[derive(Deserialize)]
struct TagDetails {
    parameter_size: Option<String>,
    quantization_level: Option<String>,
    family: Option<String>,
}

impl From<TagModel> for ModelInfo {
    fn from(tag: TagModel) -> Self {
        let mut parameters = std::collections::HashMap::new();
        let mut tags = Vec::new();

        if let Some(details) = tag.details {
            if let Some(size) = details.parameter_size {
                parameters.insert("parameter_size".to_string(), serde_json::Value::from(size));
            }
            if let Some(quant) = details.quantization_level {
                parameters.insert("quantization".to_string(), serde_json::Value::from(quant));
            }
            if let Some(family) = details.family {
                tags.push(family);
            }
        }

        ModelInfo {
            name: tag.name.clone(),
            id: tag.name,
            provider: "local".to_string(),
            description: "Locally installed model".to_string(),
            tags,
            context_size: None,
            parameters,
        }
    }
}
