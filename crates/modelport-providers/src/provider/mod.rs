//! Provider contract and router

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::ProviderError,
    models::{CompletionResponse, Message, ModelInfo},
    options::GenerationOptions,
    streaming::CompletionStream,
};

pub mod router;

pub use router::{ProviderRouter, RetryPolicy};

/// Closed set of provider variants; selection dispatches on this enum rather
/// than on strings so the compiler checks exhaustiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local inference daemon reached over HTTP
    Local,
    /// Hosted API reached over HTTPS
    Remote,
    /// Deterministic in-process test double
    Mock,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Remote => write!(f, "remote"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

/// A single-prompt completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model id to generate with
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Optional system instruction
    pub system_prompt: Option<String>,
    /// Generation tunables
    #[serde(default)]
    pub options: GenerationOptions,
}

impl CompletionRequest {
    /// Minimal request with default options
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_prompt: None,
            options: GenerationOptions::default(),
        }
    }
}

/// An ordered-conversation completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model id to generate with
    pub model: String,
    /// Conversation, system message first
    pub messages: Vec<Message>,
    /// Generation tunables
    #[serde(default)]
    pub options: GenerationOptions,
}

/// Contract implemented by every provider variant.
///
/// Connection lifecycle, error taxonomy, and the streaming protocol are
/// identical in shape across variants; only the transport differs. State
/// transitions are reported to the injected
/// [`ConnectionStatusService`](crate::status::ConnectionStatusService), and
/// successful completions are written through to the injected
/// [`OfflineCache`](crate::cache::OfflineCache).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> ProviderKind;

    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Cheap capability check (endpoint/credentials present). Does not imply
    /// a live connection.
    fn is_available(&self) -> bool;

    /// Perform the handshake. Transitions Disconnected -> Connecting ->
    /// Connected, or to Error on failure. Calling while already connected is
    /// a no-op success.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Tear down the session. Always succeeds and clears active-model
    /// bookkeeping; a disconnect while disconnected is a no-op.
    async fn disconnect(&self);

    /// Models currently installed/served by the backend. Fails with
    /// `ProviderUnavailable` when not connected.
    async fn available_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Look up a single model by id; `ModelNotFound` when unknown.
    async fn model_info(&self, id: &str) -> Result<ModelInfo, ProviderError>;

    /// Single round-trip completion. In offline mode the cache is consulted
    /// instead of the backend.
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Chat analogue of [`generate_completion`](Self::generate_completion).
    /// Variants without a native chat mode flatten the conversation into a
    /// role-prefixed prompt.
    async fn generate_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Streaming completion. Fails like `generate_completion` before the
    /// first event; once streaming has begun, failures terminate the stream
    /// with a `done: true` event rather than an error.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, ProviderError>;

    /// Chat analogue of [`stream_completion`](Self::stream_completion).
    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, ProviderError>;

    /// Toggle cache-first offline behavior
    fn set_offline_mode(&self, enabled: bool);
}
