//! Router facade over registered provider variants

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ChatRequest, CompletionRequest, LlmProvider, ProviderKind};
use crate::{
    error::ProviderError,
    models::{CompletionResponse, ModelInfo},
    status::ConnectionStatusService,
    streaming::CompletionStream,
};

/// Owns the registered providers and the active selection, and exposes the
/// uniform surface callers use (chat panels, refactoring tools, review
/// summarizers).
///
/// Request options are validated here, at the boundary, so providers can
/// assume well-formed input. The router adds no retries; see
/// [`RetryPolicy`] for the caller-side decorator.
pub struct ProviderRouter {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    active: RwLock<Option<ProviderKind>>,
    status: Arc<ConnectionStatusService>,
}

impl ProviderRouter {
    /// Create a router publishing state changes through `status`
    pub fn new(status: Arc<ConnectionStatusService>) -> Self {
        Self {
            providers: HashMap::new(),
            active: RwLock::new(None),
            status,
        }
    }

    /// Register a provider variant, replacing any previous registration of
    /// the same kind.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        debug!(kind = %provider.kind(), name = provider.name(), "registered provider");
        self.providers.insert(provider.kind(), provider);
    }

    /// Registered variants
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    /// The shared status service
    pub fn status(&self) -> &Arc<ConnectionStatusService> {
        &self.status
    }

    /// Currently active variant, if any
    pub fn active_kind(&self) -> Option<ProviderKind> {
        *self.active.read().expect("active lock poisoned")
    }

    /// Connect `kind` and make it the active provider. Any other provider
    /// currently active is disconnected first so the status session is
    /// released before the new handshake begins.
    pub async fn activate(&self, kind: ProviderKind) -> Result<(), ProviderError> {
        let provider = self
            .providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::ProviderUnavailable(format!("{kind} not registered")))?;

        if let Some(current) = self.active_kind() {
            if current != kind {
                if let Some(previous) = self.providers.get(&current) {
                    debug!(from = %current, to = %kind, "switching active provider");
                    previous.disconnect().await;
                }
                *self.active.write().expect("active lock poisoned") = None;
            }
        }

        provider.connect().await?;
        *self.active.write().expect("active lock poisoned") = Some(kind);
        info!(kind = %kind, name = provider.name(), "activated provider");
        Ok(())
    }

    /// The active provider, or `ProviderUnavailable` when none is selected.
    pub fn active(&self) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let kind = self
            .active_kind()
            .ok_or_else(|| ProviderError::ProviderUnavailable("no active provider".to_string()))?;
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::ProviderUnavailable(format!("{kind} not registered")))
    }

    /// Disconnect the active provider and clear the selection.
    pub async fn disconnect(&self) {
        if let Ok(provider) = self.active() {
            provider.disconnect().await;
        }
        *self.active.write().expect("active lock poisoned") = None;
    }

    /// Models served by the active provider
    pub async fn available_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.active()?.available_models().await
    }

    /// Model lookup on the active provider
    pub async fn model_info(&self, id: &str) -> Result<ModelInfo, ProviderError> {
        self.active()?.model_info(id).await
    }

    /// Validated single round-trip completion on the active provider
    pub async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        request.options.validate()?;
        self.active()?.generate_completion(request).await
    }

    /// Validated chat completion on the active provider
    pub async fn generate_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        request.options.validate()?;
        self.active()?.generate_chat_completion(request).await
    }

    /// Validated streaming completion on the active provider
    pub async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, ProviderError> {
        request.options.validate()?;
        self.active()?.stream_completion(request).await
    }

    /// Validated streaming chat completion on the active provider
    pub async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, ProviderError> {
        request.options.validate()?;
        self.active()?.stream_chat_completion(request).await
    }

    /// Toggle offline mode on the active provider
    pub fn set_offline_mode(&self, enabled: bool) -> Result<(), ProviderError> {
        self.active()?.set_offline_mode(enabled);
        Ok(())
    }
}

/// Caller-side retry decorator with exponential backoff.
///
/// Retries stay outside the provider contract; wrap individual calls in a
/// policy when the call site wants them. Only transport-shaped failures
/// (`RequestFailed`, `ConnectionFailed`) are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// `attempts` additional tries after the first failure
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts,
            initial_backoff,
        }
    }

    /// Run `op`, retrying transient failures with doubling backoff.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts && is_transient(&err) => {
                    let backoff = self.initial_backoff * 2_u32.pow(attempt);
                    warn!(attempt = attempt + 1, ?backoff, error = %err, "retrying after transient failure");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

fn is_transient(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::RequestFailed(_) | ProviderError::ConnectionFailed(_)
    )
}
