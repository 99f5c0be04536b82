//! Property-based tests for the streaming delta protocol

use futures::{executor::block_on, StreamExt};
use modelport_providers::{stream_from_text, whitespace_deltas, StreamEvent};
use proptest::prelude::*;

proptest! {
    /// Concatenating every delta (in delivery order) reconstructs the
    /// original text, for arbitrary input including unicode and runs of
    /// whitespace.
    #[test]
    fn deltas_reconstruct_any_text(text in "\\PC{0,200}") {
        prop_assert_eq!(whitespace_deltas(&text).concat(), text.clone());

        let events: Vec<StreamEvent> =
            block_on(stream_from_text(text.clone()).collect());
        let rebuilt: String = events.iter().map(|e| e.content.as_str()).collect();
        prop_assert_eq!(rebuilt, text);
    }

    /// Every stream ends with exactly one terminal event, and nothing
    /// follows it.
    #[test]
    fn exactly_one_terminal_event(text in "\\PC{0,200}") {
        let events: Vec<StreamEvent> =
            block_on(stream_from_text(text).collect());

        prop_assert!(!events.is_empty());
        prop_assert_eq!(events.iter().filter(|e| e.done).count(), 1);
        prop_assert!(events.last().unwrap().done);
    }

    /// Non-terminal deltas are never empty; silence is expressed by not
    /// emitting an event, not by empty deltas.
    #[test]
    fn non_terminal_deltas_are_non_empty(text in "\\PC{0,200}") {
        let events: Vec<StreamEvent> =
            block_on(stream_from_text(text).collect());
        prop_assert!(events[..events.len() - 1].iter().all(|e| !e.content.is_empty()));
    }
}
