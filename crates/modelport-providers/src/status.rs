//! Connection state machine with observable transitions

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Lifecycle state of a provider session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Initial state; also reached by any disconnect
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Handshake succeeded; requests may be dispatched
    Connected,
    /// Handshake or transport failed; retry goes back through Connecting
    Error,
}

/// Notification published after each state transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    /// State after the transition
    pub state: ConnectionState,
    /// Provider owning the session, when one has been recorded
    pub provider_name: Option<String>,
    /// Active model, when one has been selected
    pub model_name: Option<String>,
}

struct StatusInner {
    state: ConnectionState,
    provider_name: Option<String>,
    model_name: Option<String>,
}

/// Tracks the active provider session's state machine and publishes
/// transition events to subscribers.
///
/// Construct one per session context and pass it explicitly; there is no
/// global instance. Events are emitted after internal state is updated, so a
/// subscriber reading back through the service always observes a consistent
/// snapshot.
pub struct ConnectionStatusService {
    inner: Mutex<StatusInner>,
    events: broadcast::Sender<StatusEvent>,
}

impl ConnectionStatusService {
    /// Create a new service in the `Disconnected` state
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(StatusInner {
                state: ConnectionState::Disconnected,
                provider_name: None,
                model_name: None,
            }),
            events,
        }
    }

    /// Subscribe to transition events. Each receiver sees events in the
    /// exact order transitions occurred.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().expect("status lock poisoned").state
    }

    /// Name of the provider owning the current session
    pub fn provider_name(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("status lock poisoned")
            .provider_name
            .clone()
    }

    /// Currently selected model
    pub fn model_name(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("status lock poisoned")
            .model_name
            .clone()
    }

    /// Record the start of a handshake. Valid from `Disconnected` and
    /// `Error` (retry); anything else is rejected.
    pub fn begin_connect(&self, provider: &str) -> bool {
        self.apply(ConnectionState::Connecting, |inner| {
            inner.provider_name = Some(provider.to_string());
        })
    }

    /// Record a successful handshake, optionally selecting a model. Only
    /// valid while `Connecting`.
    pub fn mark_connected(&self, model: Option<&str>) -> bool {
        self.apply(ConnectionState::Connected, |inner| {
            if let Some(model) = model {
                inner.model_name = Some(model.to_string());
            }
        })
    }

    /// Record a handshake or transport failure. Valid from `Connecting` and
    /// `Connected`.
    pub fn mark_error(&self) -> bool {
        self.apply(ConnectionState::Error, |_| {})
    }

    /// Record a disconnect. Always succeeds; clears the active model. A
    /// disconnect while already `Disconnected` is a no-op and emits nothing.
    pub fn mark_disconnected(&self) -> bool {
        {
            let inner = self.inner.lock().expect("status lock poisoned");
            if inner.state == ConnectionState::Disconnected {
                return true;
            }
        }
        self.apply(ConnectionState::Disconnected, |inner| {
            inner.model_name = None;
        })
    }

    /// Update the selected model without a state transition; emits an event
    /// carrying the current state.
    pub fn set_active_model(&self, model: &str) {
        let event = {
            let mut inner = self.inner.lock().expect("status lock poisoned");
            inner.model_name = Some(model.to_string());
            snapshot(&inner)
        };
        let _ = self.events.send(event);
    }

    fn apply(&self, next: ConnectionState, update: impl FnOnce(&mut StatusInner)) -> bool {
        let event = {
            let mut inner = self.inner.lock().expect("status lock poisoned");
            if !is_valid_transition(inner.state, next) {
                warn!(from = ?inner.state, to = ?next, "rejected invalid state transition");
                return false;
            }
            debug!(from = ?inner.state, to = ?next, "connection state transition");
            inner.state = next;
            update(&mut inner);
            snapshot(&inner)
        };
        // Emit only after the lock is released so re-entrant readers see the
        // updated state.
        let _ = self.events.send(event);
        true
    }
}

impl Default for ConnectionStatusService {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(inner: &StatusInner) -> StatusEvent {
    StatusEvent {
        state: inner.state,
        provider_name: inner.provider_name.clone(),
        model_name: inner.model_name.clone(),
    }
}

/// `Connected` and `Error` are only reachable through `Connecting`; any
/// non-disconnected state may disconnect.
fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    matches!(
        (from, to),
        (Disconnected, Connecting)
            | (Error, Connecting)
            | (Connecting, Connected)
            | (Connecting, Error)
            | (Connected, Error)
            | (Connecting, Disconnected)
            | (Connected, Disconnected)
            | (Error, Disconnected)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let status = ConnectionStatusService::new();
        assert_eq!(status.state(), ConnectionState::Disconnected);

        assert!(status.begin_connect("mock"));
        assert_eq!(status.state(), ConnectionState::Connecting);
        assert_eq!(status.provider_name().as_deref(), Some("mock"));

        assert!(status.mark_connected(Some("model1")));
        assert_eq!(status.state(), ConnectionState::Connected);
        assert_eq!(status.model_name().as_deref(), Some("model1"));

        assert!(status.mark_disconnected());
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert_eq!(status.model_name(), None);
    }

    #[test]
    fn connected_is_unreachable_without_connecting() {
        let status = ConnectionStatusService::new();
        assert!(!status.mark_connected(None));
        assert_eq!(status.state(), ConnectionState::Disconnected);

        assert!(status.begin_connect("mock"));
        assert!(status.mark_error());
        assert!(!status.mark_connected(None));
        assert_eq!(status.state(), ConnectionState::Error);
    }

    #[test]
    fn error_retries_through_connecting() {
        let status = ConnectionStatusService::new();
        status.begin_connect("mock");
        status.mark_error();

        assert!(status.begin_connect("mock"));
        assert!(status.mark_connected(None));
        assert_eq!(status.state(), ConnectionState::Connected);
    }

    #[test]
    fn disconnect_while_disconnected_is_a_noop() {
        let status = ConnectionStatusService::new();
        let mut rx = status.subscribe();

        assert!(status.mark_disconnected());
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn model_selection_emits_without_a_transition() {
        let status = ConnectionStatusService::new();
        status.begin_connect("local");
        status.mark_connected(None);

        let mut rx = status.subscribe();
        status.set_active_model("llama3:8b");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.state, ConnectionState::Connected);
        assert_eq!(event.model_name.as_deref(), Some("llama3:8b"));
        assert_eq!(status.model_name().as_deref(), Some("llama3:8b"));
    }

    #[tokio::test]
    async fn subscribers_observe_transitions_in_order() {
        let status = ConnectionStatusService::new();
        let mut rx = status.subscribe();

        status.begin_connect("mock");
        status.mark_connected(Some("model1"));
        status.mark_disconnected();

        assert_eq!(rx.recv().await.unwrap().state, ConnectionState::Connecting);
        let connected = rx.recv().await.unwrap();
        assert_eq!(connected.state, ConnectionState::Connected);
        assert_eq!(connected.model_name.as_deref(), Some("model1"));
        assert_eq!(
            rx.recv().await.unwrap().state,
            ConnectionState::Disconnected
        );
    }
}
