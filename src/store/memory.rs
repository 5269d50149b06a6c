//! Reference in-memory implementation of the event-store client contract.

use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::EventStore;
use crate::errors::EventStoreError;
use crate::event::{EventEnvelope, GenericDomainEvent};

struct State {
    streams: IndexMap<String, Vec<EventEnvelope<GenericDomainEvent>>>,
    global_nonce_counter: u64,
}

/// In-process, single-connection event store. Seeds unit and integration
/// tests and serves as the reference implementation every other backend's
/// behavior is checked against.
///
/// Guarded by one `tokio::sync::RwLock` covering both the stream map and the
/// global nonce counter, so `append_events`' validate-then-mutate sequence
/// is a single critical section with no `.await` point in between — the
/// property the cancellation-safety contract in the concurrency model
/// depends on.
pub struct InMemoryEventStore {
    state: RwLock<State>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                streams: IndexMap::new(),
                global_nonce_counter: 0,
            }),
        }
    }

    /// Test helper: removes every stream and resets the global counter.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.streams.clear();
        state.global_nonce_counter = 0;
    }

    /// Test helper: the current version (event count) of `stream_name`.
    pub async fn get_stream_version(&self, stream_name: &str) -> u64 {
        let state = self.state.read().await;
        state
            .streams
            .get(stream_name)
            .map(|events| events.len() as u64)
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn connect(&self) -> Result<(), EventStoreError> {
        tracing::debug!("in-memory event store connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EventStoreError> {
        tracing::debug!("in-memory event store disconnected");
        Ok(())
    }

    async fn read_events(
        &self,
        stream_name: &str,
        from_version: Option<u64>,
    ) -> Result<Vec<EventEnvelope<GenericDomainEvent>>, EventStoreError> {
        let state = self.state.read().await;
        match state.streams.get(stream_name) {
            None if from_version.is_some() => {
                Err(EventStoreError::StreamNotFound(stream_name.to_string()))
            }
            None => Ok(Vec::new()),
            Some(events) => {
                let from = from_version.unwrap_or(0);
                Ok(events
                    .iter()
                    .filter(|envelope| envelope.metadata.aggregate_nonce > from)
                    .cloned()
                    .collect())
            }
        }
    }

    async fn append_events(
        &self,
        stream_name: &str,
        events: Vec<EventEnvelope<GenericDomainEvent>>,
        expected_version: Option<u64>,
    ) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let current_version = state
            .streams
            .get(stream_name)
            .map(|events| events.len() as u64)
            .unwrap_or(0);

        if let Some(expected) = expected_version {
            if expected != current_version {
                return Err(EventStoreError::ConcurrencyConflict {
                    expected_version: expected,
                    actual_version: current_version as i64,
                });
            }
        }

        let mut rewritten = Vec::with_capacity(events.len());
        for event in events {
            let global_nonce = state.global_nonce_counter;
            state.global_nonce_counter += 1;
            rewritten.push(event.with_global_nonce(global_nonce));
        }

        let appended = rewritten.len() as u64;
        state
            .streams
            .entry(stream_name.to_string())
            .or_default()
            .extend(rewritten);

        tracing::debug!(stream_name, new_version = current_version + appended, "appended events");
        Ok(())
    }

    async fn stream_exists(&self, stream_name: &str) -> Result<bool, EventStoreError> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(stream_name)
            .map(|events| !events.is_empty())
            .unwrap_or(false))
    }

    async fn read_all_events_from(
        &self,
        after_global_nonce: u64,
        limit: usize,
    ) -> Result<Vec<EventEnvelope<GenericDomainEvent>>, EventStoreError> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state
            .streams
            .values()
            .flatten()
            .filter(|envelope| {
                envelope
                    .metadata
                    .global_nonce
                    .is_some_and(|nonce| nonce > after_global_nonce)
            })
            .cloned()
            .collect();
        all.sort_by_key(|envelope| envelope.metadata.global_nonce);
        all.truncate(limit);
        Ok(all)
    }
}
