//! ModelPort provider runtime
//!
//! A uniform abstraction over interchangeable LLM backends: a provider
//! contract with local, remote, and mock variants, a connection state
//! machine with observable transitions, a streaming delta protocol, and an
//! offline response cache with best-effort fallback.

pub mod cache;
pub mod error;
pub mod models;
pub mod options;
pub mod provider;
pub mod providers;
pub mod status;
pub mod streaming;

pub use cache::{OfflineCache, OFFLINE_PLACEHOLDER};
pub use error::ProviderError;
pub use models::{
    flatten_messages, CompletionResponse, Message, ModelInfo, Role, StreamEvent, TokenUsage,
};
pub use options::GenerationOptions;
pub use provider::{
    ChatRequest, CompletionRequest, LlmProvider, ProviderKind, ProviderRouter, RetryPolicy,
};
pub use providers::{LocalProvider, MockProvider, RemoteProvider, DEFAULT_LOCAL_ENDPOINT};
pub use status::{ConnectionState, ConnectionStatusService, StatusEvent};
pub use streaming::{stream_from_text, whitespace_deltas, CompletionStream};
